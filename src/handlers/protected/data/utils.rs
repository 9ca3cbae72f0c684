use std::collections::HashMap;

use axum::body::Bytes;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::Actor;
use crate::database::entity::EntityDef;
use crate::database::repository::Repository;
use crate::error::ApiError;
use crate::routes::AppState;

pub fn repository(state: &AppState, def: &'static EntityDef) -> Repository {
    Repository::new(def, state.store.clone())
}

/// Request body as JSON; an empty body is rejected
pub fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Err(ApiError::invalid_json("Request body is required"));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::invalid_json(format!("Invalid JSON format: {}", e)))
}

/// Optional `?<scope_column>=<uuid>` list filter
pub fn scope_filter(def: &EntityDef, params: &HashMap<String, String>) -> Result<Option<Uuid>, ApiError> {
    let Some(column) = def.scope else {
        return Ok(None);
    };
    params
        .get(column)
        .map(|raw| {
            Uuid::parse_str(raw).map_err(|_| ApiError::field_error(column, format!("Invalid UUID format: {}", raw)))
        })
        .transpose()
}

/// Fill in the caller as owner when an owned input omits it
pub fn with_owner(def: &EntityDef, input: &Value, actor: &Actor) -> Value {
    let mut input = input.clone();
    if let (Some(column), Value::Object(map)) = (def.owner, &mut input) {
        if map.get(column).map_or(true, Value::is_null) {
            map.insert(column.to_string(), Value::String(actor.id.to_string()));
        }
    }
    input
}
