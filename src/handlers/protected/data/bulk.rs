use axum::{
    body::Bytes,
    extract::{Extension, State},
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::utils::{parse_body, repository, with_owner};
use crate::auth::Actor;
use crate::batch::{self, authorize, Access, BatchOutcome};
use crate::database::entity::EntityDef;
use crate::database::record::{FieldErrors, Record, RecordError, RecordMode};
use crate::database::repository::Row;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Serialize)]
pub struct BulkCreated {
    pub created: usize,
    pub records: Vec<Row>,
}

/// `{ "items": [...] }` or a bare array
fn bulk_items(body: Value) -> Result<Vec<Value>, ApiError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ApiError::field_error("items", "Expected an array of records")),
        },
        _ => Err(ApiError::field_error("items", "Expected an array of records")),
    }
}

/// POST /api/v1/:entity/bulk - Create many records in one transaction
pub async fn post(
    State(state): State<AppState>,
    Extension(def): Extension<&'static EntityDef>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> ApiResult<BulkCreated> {
    authorize(def, &actor)?;
    let items: Vec<Value> = bulk_items(parse_body(&body)?)?
        .iter()
        .map(|item| with_owner(def, item, &actor))
        .collect();
    if items.is_empty() {
        return Err(ApiError::field_error("items", "At least one record is required"));
    }

    let mut errors = FieldErrors::new();
    let records = Record::parse_many(def, &items, RecordMode::Create, "items", &mut errors);
    if !errors.is_empty() {
        return Err(RecordError::Invalid(errors).into());
    }
    let access = Access::new(state.store.as_ref(), def, &actor);
    for record in &records {
        access.check_record(record, None).await?;
    }

    let rows = repository(&state, def).create_all(records, actor.id).await?;
    info!("Bulk created {} {} record(s)", rows.len(), def.label);
    Ok(ApiResponse::created(BulkCreated {
        created: rows.len(),
        records: rows,
    }))
}

/// PUT /api/v1/:entity/bulk - Batch reconciliation for one parent scope
///
/// Body: `{ <scope>?, new_<items>?, updated_<items>?, deleted_<items>? }`
pub async fn put(
    State(state): State<AppState>,
    Extension(def): Extension<&'static EntityDef>,
    Extension(actor): Extension<Actor>,
    body: Bytes,
) -> ApiResult<BatchOutcome> {
    let input = parse_body(&body)?;
    let outcome = batch::execute(state.store.as_ref(), def, &input, &actor).await?;
    Ok(ApiResponse::success(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_wrapped_or_bare_arrays() {
        assert_eq!(bulk_items(json!([{ "a": 1 }])).unwrap().len(), 1);
        assert_eq!(bulk_items(json!({ "items": [{}, {}] })).unwrap().len(), 2);
        assert!(bulk_items(json!({ "records": [] })).is_err());
        assert!(bulk_items(json!("x")).is_err());
    }
}
