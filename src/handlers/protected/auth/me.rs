use axum::extract::{Extension, State};

use crate::auth::Actor;
use crate::database::models::{User, UserLookup};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

/// GET /api/auth/me - The authenticated user's account
pub async fn get(State(state): State<AppState>, Extension(actor): Extension<Actor>) -> ApiResult<User> {
    let user = state
        .store
        .find_user(UserLookup::Id(actor.id))
        .await?
        .ok_or_else(|| ApiError::not_found("User no longer exists"))?;
    Ok(ApiResponse::success(user))
}
