// handlers/public/portfolio.rs - GET /api/v1/portfolio/:username handler

use axum::extract::{Path, State};

use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;
use crate::services::{Portfolio, PortfolioService};

/// GET /api/v1/portfolio/:username - Public profile with its active records
pub async fn get(State(state): State<AppState>, Path(username): Path<String>) -> ApiResult<Portfolio> {
    let portfolio = PortfolioService::new(state.store.clone())
        .load(&username.to_lowercase())
        .await?;
    Ok(ApiResponse::success(portfolio))
}
