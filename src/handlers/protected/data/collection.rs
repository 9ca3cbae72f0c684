use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Extension, Query, State},
};
use tracing::info;

use super::utils::{parse_body, repository, scope_filter, with_owner};
use crate::auth::Actor;
use crate::batch::{authorize, Access};
use crate::database::entity::EntityDef;
use crate::database::record::{Record, RecordError, RecordMode};
use crate::database::repository::Row;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

/// GET /api/v1/:entity - All active rows, optionally for one parent
pub async fn get(
    State(state): State<AppState>,
    Extension(def): Extension<&'static EntityDef>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Row>> {
    let scope = scope_filter(def, &params)?;
    let rows = repository(&state, def).select_any(scope).await?;
    Ok(ApiResponse::success(rows))
}

/// POST /api/v1/:entity - Create one record
pub async fn post(
    State(state): State<AppState>,
    Extension(def): Extension<&'static EntityDef>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> ApiResult<Row> {
    authorize(def, &actor)?;
    let input = with_owner(def, &parse_body(&body)?, &actor);
    let record = Record::parse(def, &input, RecordMode::Create).map_err(RecordError::Invalid)?;
    Access::new(state.store.as_ref(), def, &actor).check_record(&record, None).await?;

    let row = repository(&state, def).create_one(record, actor.id).await?;
    info!("Created {} {}", def.label, row.get("id").and_then(|v| v.as_str()).unwrap_or("?"));
    Ok(ApiResponse::created(row))
}
