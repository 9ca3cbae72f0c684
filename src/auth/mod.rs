pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Actor role carried in every token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Recruiter,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Role> {
        match value.trim().to_ascii_lowercase().as_str() {
            "candidate" => Some(Role::Candidate),
            "recruiter" => Some(Role::Recruiter),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Recruiter => "recruiter",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, role: Role, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        }
    }
}

/// The authenticated caller, taken from verified claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this actor may touch records owned by `user_id`
    pub fn acts_for(&self, user_id: Uuid) -> bool {
        self.id == user_id || self.is_admin()
    }
}

impl From<Claims> for Actor {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

/// Token lifetime for a new session
pub fn session_lifetime(security: &crate::config::SecurityConfig, remember: bool) -> Duration {
    if remember {
        Duration::days(security.remember_days)
    } else {
        Duration::hours(security.session_hours)
    }
}

pub fn issue_token(secret: &str, claims: &Claims) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &key).map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

/// Decode and validate an HS256 token, including expiry
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }
    let key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_tokens_verify() {
        let id = Uuid::new_v4();
        let claims = Claims::new(id, Role::Recruiter, Duration::hours(24));
        let token = issue_token(SECRET, &claims).unwrap();
        let decoded = verify_token(SECRET, &token).unwrap();
        assert_eq!(decoded.sub, id);
        assert_eq!(decoded.role, Role::Recruiter);
        assert_eq!(decoded.exp - decoded.iat, 24 * 3600);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let claims = Claims::new(Uuid::new_v4(), Role::Candidate, Duration::hours(1));
        let token = issue_token(SECRET, &claims).unwrap();
        assert!(matches!(verify_token("other", &token), Err(AuthError::InvalidToken(_))));

        let expired = Claims::new(Uuid::new_v4(), Role::Candidate, Duration::hours(-2));
        let token = issue_token(SECRET, &expired).unwrap();
        assert!(verify_token(SECRET, &token).is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        let claims = Claims::new(Uuid::new_v4(), Role::Admin, Duration::hours(1));
        assert!(matches!(issue_token("", &claims), Err(AuthError::InvalidSecret)));
    }

    #[test]
    fn remember_me_extends_lifetime() {
        let security = crate::config::AppConfig::development().security;
        assert_eq!(session_lifetime(&security, false), Duration::hours(24));
        assert_eq!(session_lifetime(&security, true), Duration::days(30));
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!(Role::parse("Recruiter"), Some(Role::Recruiter));
        assert_eq!(Role::parse("guest"), None);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
