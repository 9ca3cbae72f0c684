// handlers/protected/images.rs - GET /api/v1/images/search handler

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub per_page: Option<String>,
}

/// GET /api/v1/images/search?query=&per_page= - Proxied photo search
pub async fn search_get(State(state): State<AppState>, Query(params): Query<SearchQuery>) -> ApiResult<Value> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::field_error("query", "This field is required"))?;
    let per_page = params
        .per_page
        .as_deref()
        .map(|raw| {
            raw.trim()
                .parse::<u32>()
                .map_err(|_| ApiError::field_error("per_page", format!("Expected a positive integer, got '{}'", raw)))
        })
        .transpose()?;

    let results = state.images.search(query, per_page).await?;
    Ok(ApiResponse::success(json!({ "results": results })))
}
