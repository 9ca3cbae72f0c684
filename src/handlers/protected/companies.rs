// handlers/protected/companies.rs - GET /api/v1/companies/size handler

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::entity::lookup;
use crate::database::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct SizeQuery {
    pub low: Option<String>,
    pub high: Option<String>,
}

fn bound(name: &str, raw: Option<&str>) -> Result<i64, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::field_error(name, "This field is required"))?;
    let value: i64 = raw
        .parse()
        .map_err(|_| ApiError::field_error(name, format!("Expected an integer, got '{}'", raw)))?;
    if value < 0 {
        return Err(ApiError::field_error(name, "Must not be negative"));
    }
    Ok(value)
}

/// Inclusive `[low, high]` bounds from the query string
pub fn size_range(query: &SizeQuery) -> Result<(i64, i64), ApiError> {
    let low = bound("low", query.low.as_deref())?;
    let high = bound("high", query.high.as_deref())?;
    if low > high {
        return Err(ApiError::field_error("low", "Must not exceed 'high'"));
    }
    Ok((low, high))
}

/// GET /api/v1/companies/size?low=&high= - Active companies with `low <= size <= high`
pub async fn size_get(State(state): State<AppState>, Query(query): Query<SizeQuery>) -> ApiResult<Value> {
    let (low, high) = size_range(&query)?;
    let def = lookup("companies").ok_or_else(|| ApiError::internal_server_error("companies entity missing"))?;
    let (items, total) = Repository::new(def, state.store.clone())
        .select_range("size", low, high)
        .await?;
    Ok(ApiResponse::success(json!({ "items": items, "total": total })))
}
