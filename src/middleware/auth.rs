use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::auth::{verify_token, Actor};
use crate::error::ApiError;
use crate::routes::AppState;

/// Session cookie set by login and cleared by logout
pub const AUTH_COOKIE: &str = "auth_token";

/// JWT authentication middleware: verifies the token and injects the [`Actor`]
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&headers).map_err(|msg| {
        tracing::debug!("Authentication denied: {}", msg);
        ApiError::unauthorized(msg)
    })?;

    let claims = verify_token(&state.config.security.jwt_secret, &token)?;
    request.extensions_mut().insert(Actor::from(claims));

    Ok(next.run(request).await)
}

/// Bearer header first, then the `auth_token` cookie
pub fn extract_token(headers: &HeaderMap) -> Result<String, String> {
    if let Some(header) = headers.get(axum::http::header::AUTHORIZATION) {
        let value = header
            .to_str()
            .map_err(|_| "Invalid Authorization header format".to_string())?;
        return match value.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            Some(_) => Err("Empty JWT token".to_string()),
            None => Err("Authorization header must use Bearer token format".to_string()),
        };
    }

    CookieJar::from_headers(headers)
        .get(AUTH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| "Missing Authorization header or auth_token cookie".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_bearer_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer header-token"));
        headers.insert("cookie", HeaderValue::from_static("auth_token=cookie-token"));
        assert_eq!(extract_token(&headers).unwrap(), "header-token");
    }

    #[test]
    fn falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("theme=dark; auth_token=cookie-token"));
        assert_eq!(extract_token(&headers).unwrap(), "cookie-token");
    }

    #[test]
    fn rejects_malformed_or_missing_credentials() {
        let mut headers = HeaderMap::new();
        assert!(extract_token(&headers).is_err());
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_token(&headers).is_err());
        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert!(extract_token(&headers).is_err());
    }
}
