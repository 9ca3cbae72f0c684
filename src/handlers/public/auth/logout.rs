// handlers/public/auth/logout.rs - POST /api/auth/logout handler

use axum::{extract::State, http::header::SET_COOKIE, response::IntoResponse};
use serde_json::json;

use super::utils::expired_cookie;
use crate::middleware::ApiResponse;
use crate::routes::AppState;

/// POST /api/auth/logout - Expire the session cookie
///
/// Tokens are stateless, so a bearer token stays valid until `exp`.
pub async fn logout_post(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(SET_COOKIE, expired_cookie(state.config.security.cookie_secure))],
        ApiResponse::success(json!({ "logged_out": true })),
    )
}
