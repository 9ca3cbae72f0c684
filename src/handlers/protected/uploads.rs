// handlers/protected/uploads.rs - Object storage uploads

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::Actor;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::storage::{check_delete_key, object_key};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub category: Option<String>,
    pub ext: Option<String>,
}

/// POST /api/v1/uploads?category=&ext= - Store the raw request body
///
/// The key is always under the caller's own prefix.
pub async fn upload_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Value> {
    let category = query
        .category
        .ok_or_else(|| ApiError::field_error("category", "This field is required"))?;
    let ext = query.ext.ok_or_else(|| ApiError::field_error("ext", "This field is required"))?;
    if body.is_empty() {
        return Err(ApiError::bad_request("Upload body is empty"));
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let key = object_key(actor.id, &category, &ext)?;
    let size = body.len();
    let url = state.objects.put(&key, &content_type, body.to_vec()).await?;

    info!("Stored {} ({} bytes, {})", key, size, content_type);
    Ok(ApiResponse::created(json!({ "key": key, "url": url })))
}

/// DELETE /api/v1/uploads/*key - Delete by exact key
pub async fn upload_delete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(key): Path<String>,
) -> ApiResult<Value> {
    check_delete_key(&key, &actor)?;
    state.objects.delete(&key).await?;
    info!("Deleted object {}", key);
    Ok(ApiResponse::success(json!({ "key": key, "deleted": true })))
}
