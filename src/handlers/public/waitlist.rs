// handlers/public/waitlist.rs - POST /api/v1/waitlist handler

use axum::{body::Bytes, extract::State};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::auth::utils::{parse_json, valid_email};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WaitlistRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// POST /api/v1/waitlist - Join the waitlist; repeating an email is a no-op
pub async fn post(State(state): State<AppState>, body: Bytes) -> ApiResult<Value> {
    let request: WaitlistRequest = parse_json(&body)?;
    let email = request.email.as_deref().map(str::trim).unwrap_or_default().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::field_error("email", "This field is required"));
    }
    if !valid_email(&email) {
        return Err(ApiError::field_error("email", "Invalid email address"));
    }
    let name = request.name.as_deref().map(str::trim).filter(|n| !n.is_empty());

    state.store.join_waitlist(&email, name).await?;
    info!("Waitlist signup: {}", email);
    Ok(ApiResponse::created(json!({ "email": email })))
}
