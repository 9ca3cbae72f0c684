use axum::body::Bytes;
use chrono::{TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::auth::{issue_token, session_lifetime, Claims};
use crate::config::AppConfig;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::AUTH_COOKIE;

/// Decode a JSON request body into `T`
pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::invalid_json("Request body is required"));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::invalid_json(format!("Invalid JSON format: {}", e)))
}

/// Loose `local@domain.tld` check
pub fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain
            .split_once('.')
            .map(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
            .unwrap_or(false)
}

pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        AUTH_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Issue a token for `user` and build the `Set-Cookie` value plus response body
pub fn open_session(config: &AppConfig, user: &User, remember: bool) -> Result<(String, Value), ApiError> {
    let lifetime = session_lifetime(&config.security, remember);
    let claims = Claims::new(user.id, user.role(), lifetime);
    let token = issue_token(&config.security.jwt_secret, &claims)?;

    let cookie = session_cookie(&token, lifetime.num_seconds(), config.security.cookie_secure);
    let expires_at = Utc.timestamp_opt(claims.exp, 0).single();
    let body = json!({
        "token": token,
        "expires_at": expires_at,
        "user": user,
    });
    Ok((cookie, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_email_shape() {
        assert!(valid_email("ada@example.com"));
        assert!(valid_email("a.b+c@mail.example.org"));
        assert!(!valid_email("ada"));
        assert!(!valid_email("@example.com"));
        assert!(!valid_email("ada@example"));
        assert!(!valid_email("ada@.com"));
        assert!(!valid_email("ada lovelace@example.com"));
        assert!(!valid_email("ada@@example.com"));
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("abc", 86400, false);
        assert_eq!(cookie, "auth_token=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=86400");
        assert!(session_cookie("abc", 60, true).ends_with("; Secure"));
        assert!(expired_cookie(false).contains("Max-Age=0"));
    }
}
