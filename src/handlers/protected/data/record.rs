use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
};

use super::utils::{parse_body, repository};
use crate::auth::Actor;
use crate::batch::{authorize, Access};
use crate::database::entity::EntityDef;
use crate::database::record::{parse_id, Record, RecordError, RecordMode};
use crate::database::repository::Row;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

/// GET /api/v1/:entity/:id - One active record
pub async fn get(
    State(state): State<AppState>,
    Extension(def): Extension<&'static EntityDef>,
    Path(id): Path<String>,
) -> ApiResult<Row> {
    let id = parse_id(&id)?;
    let row = repository(&state, def).select_404(id).await?;
    Ok(ApiResponse::success(row))
}

/// PUT /api/v1/:entity/:id - Partial update of mutable columns
pub async fn put(
    State(state): State<AppState>,
    Extension(def): Extension<&'static EntityDef>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Row> {
    authorize(def, &actor)?;
    let id = parse_id(&id)?;
    let record = Record::parse(def, &parse_body(&body)?, RecordMode::Patch).map_err(RecordError::Invalid)?;

    let repo = repository(&state, def);
    let existing = repo.select_404(id).await?;
    let access = Access::new(state.store.as_ref(), def, &actor);
    let pins = access.check_row(&existing).await?;
    access.check_record(&record, Some(&existing)).await?;

    let row = repo.update_one(id, pins, record, actor.id).await?;
    Ok(ApiResponse::success(row))
}

/// DELETE /api/v1/:entity/:id - Soft delete
pub async fn delete(
    State(state): State<AppState>,
    Extension(def): Extension<&'static EntityDef>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> ApiResult<Row> {
    authorize(def, &actor)?;
    let id = parse_id(&id)?;

    let repo = repository(&state, def);
    let existing = repo.select_404(id).await?;
    let pins = Access::new(state.store.as_ref(), def, &actor).check_row(&existing).await?;

    let row = repo.delete_one(id, pins, actor.id).await?;
    Ok(ApiResponse::success(row))
}
