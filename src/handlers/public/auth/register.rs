// handlers/public/auth/register.rs - POST /api/auth/register handler

use axum::{
    body::Bytes,
    extract::State,
    http::header::SET_COOKIE,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use super::utils::{open_session, parse_json, valid_email};
use crate::auth::{password::hash_password, Role};
use crate::database::models::NewUser;
use crate::database::record::FieldErrors;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::routes::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Usernames appear in portfolio URLs: 3-32 of `[a-z0-9_-]`
fn valid_username(username: &str) -> bool {
    (3..=32).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

impl RegisterRequest {
    fn validate(self) -> Result<(NewUser, String), FieldErrors> {
        let mut errors = FieldErrors::new();
        let required = "This field is required".to_string();

        let email = self.email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
        if email.is_empty() {
            errors.insert("email".into(), required.clone());
        } else if !valid_email(&email) {
            errors.insert("email".into(), "Invalid email address".into());
        }

        let username = self.username.map(|u| u.trim().to_lowercase()).unwrap_or_default();
        if username.is_empty() {
            errors.insert("username".into(), required.clone());
        } else if !valid_username(&username) {
            errors.insert("username".into(), "Use 3-32 lowercase letters, digits, '_' or '-'".into());
        }

        let name = self.name.map(|n| n.trim().to_string()).unwrap_or_default();
        if name.is_empty() {
            errors.insert("name".into(), required.clone());
        }

        let password = self.password.unwrap_or_default();
        if password.is_empty() {
            errors.insert("password".into(), required);
        } else if password.chars().count() < MIN_PASSWORD_LEN {
            errors.insert("password".into(), format!("Must be at least {} characters", MIN_PASSWORD_LEN));
        }

        let role = match self.role.as_deref().map(Role::parse) {
            None => Role::Candidate,
            Some(Some(Role::Admin)) => {
                errors.insert("role".into(), "Admin accounts cannot self-register".into());
                Role::Candidate
            }
            Some(Some(role)) => role,
            Some(None) => {
                errors.insert("role".into(), "Expected 'candidate' or 'recruiter'".into());
                Role::Candidate
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        let user = NewUser {
            email,
            username,
            name,
            password_hash: String::new(),
            role,
        };
        Ok((user, password))
    }
}

/// POST /api/auth/register - Create an account and open a session
///
/// Duplicate email or username answers 409.
pub async fn register_post(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let request: RegisterRequest = parse_json(&body)?;
    let (mut new_user, password) = request
        .validate()
        .map_err(|errors| ApiError::validation_error("Invalid registration", Some(errors)))?;
    new_user.password_hash = hash_password(&password)?;

    let user = state.store.insert_user(&new_user).await.map_err(|e| {
        if e.is_unique_violation() {
            ApiError::conflict("Email or username is already registered")
        } else {
            e.into()
        }
    })?;
    info!("Registered {} as {}", user.username, user.role);

    let (cookie, data) = open_session(&state.config, &user, false)?;
    Ok(([(SET_COOKIE, cookie)], ApiResponse::created(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            email: Some(" Ada@Example.com ".into()),
            username: Some("ada".into()),
            name: Some("Ada Lovelace".into()),
            password: Some("correct horse".into()),
            role: role.map(String::from),
        }
    }

    #[test]
    fn normalizes_and_defaults_to_candidate() {
        let (user, password) = request(None).validate().unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, Role::Candidate);
        assert_eq!(password, "correct horse");
    }

    #[test]
    fn rejects_admin_self_registration() {
        let errors = request(Some("admin")).validate().unwrap_err();
        assert!(errors.contains_key("role"));
        assert_eq!(request(Some("recruiter")).validate().unwrap().0.role, Role::Recruiter);
    }

    #[test]
    fn reports_every_bad_field() {
        let errors = RegisterRequest {
            email: Some("not-an-email".into()),
            username: Some("A".into()),
            password: Some("short".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        let fields: Vec<_> = errors.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["email", "name", "password", "username"]);
    }
}
