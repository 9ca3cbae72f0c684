use std::collections::HashMap;

use axum::extract::{Extension, Path, Query, State};

use super::utils::{repository, scope_filter};
use crate::database::entity::EntityDef;
use crate::database::pagination::{Page, PageRequest};
use crate::database::repository::Row;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

/// GET /api/v1/:entity/page/:page_no - 1-based page of active rows
///
/// A page past the end, including page 1 of an empty list, is 404.
pub async fn get(
    State(state): State<AppState>,
    Extension(def): Extension<&'static EntityDef>,
    Path(page_no): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Page<Row>> {
    let request = PageRequest::parse(&page_no)
        .ok_or_else(|| ApiError::field_error("page_no", format!("Invalid page number: {}", page_no)))?;
    let scope = scope_filter(def, &params)?;
    let page = repository(&state, def).select_page(request, scope).await?;
    Ok(ApiResponse::success(page))
}
