// handlers/public/auth/login.rs - POST /api/auth/login handler

use axum::{
    body::Bytes,
    extract::State,
    http::header::SET_COOKIE,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::utils::{open_session, parse_json};
use crate::auth::password::verify_password;
use crate::database::models::UserLookup;
use crate::database::record::FieldErrors;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    /// Extends the session to `remember_days`
    pub remember: bool,
}

/**
 * POST /api/auth/login - Verify credentials and open a session
 *
 * Input: `{ "email": "...", "password": "...", "remember": false }`
 *
 * The token is returned in the body and set as the `auth_token` cookie.
 * Unknown email and wrong password are indistinguishable (401).
 */
pub async fn login_post(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let request: LoginRequest = parse_json(&body)?;

    let email = request.email.as_deref().map(str::trim).unwrap_or_default().to_lowercase();
    let password = request.password.unwrap_or_default();
    let mut errors = FieldErrors::new();
    if email.is_empty() {
        errors.insert("email".into(), "This field is required".into());
    }
    if password.is_empty() {
        errors.insert("password".into(), "This field is required".into());
    }
    if !errors.is_empty() {
        return Err(ApiError::validation_error("Email and password are required", Some(errors)));
    }

    let user = state.store.find_user(UserLookup::Email(&email)).await?;
    let user = match user {
        Some(user) if verify_password(&password, &user.password_hash)? => user,
        _ => {
            warn!("Failed login for {}", email);
            return Err(ApiError::unauthorized("Invalid email or password"));
        }
    };

    let (cookie, data) = open_session(&state.config, &user, request.remember)?;
    info!("Login: {} ({})", user.username, user.role);
    Ok(([(SET_COOKIE, cookie)], ApiResponse::success(data)))
}
