//! Object storage for user uploads (Supabase Storage REST API).

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::Actor;
use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object storage is not configured")]
    NotConfigured,

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Object storage returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a blob and return its public URL
    async fn put(&self, key: &str, content_type: &str, body: Vec<u8>) -> Result<String, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Path segment check for categories and extensions: `[A-Za-z0-9_-]{1,64}`
pub fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.len() <= 64
        && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// `<userId>/<category>/<timestamp_ms>-<random8>.<ext>`
pub fn object_key(user_id: Uuid, category: &str, ext: &str) -> Result<String, StorageError> {
    if !valid_segment(category) {
        return Err(StorageError::InvalidKey(format!("category '{}' must match [A-Za-z0-9_-]", category)));
    }
    if !valid_segment(ext) {
        return Err(StorageError::InvalidKey(format!("extension '{}' must match [A-Za-z0-9_-]", ext)));
    }
    let random = Uuid::new_v4().simple().to_string();
    Ok(format!(
        "{}/{}/{}-{}.{}",
        user_id,
        category,
        Utc::now().timestamp_millis(),
        &random[..8],
        ext.to_ascii_lowercase()
    ))
}

/// Exact-key deletes stay inside the actor's own prefix unless the actor is an admin
pub fn check_delete_key(key: &str, actor: &Actor) -> Result<(), StorageError> {
    if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    let owner = key.split('/').next().and_then(|s| Uuid::parse_str(s).ok());
    match owner {
        Some(owner) if actor.acts_for(owner) => Ok(()),
        _ if actor.is_admin() => Ok(()),
        _ => Err(StorageError::Forbidden(format!("'{}' is outside your upload prefix", key))),
    }
}

/// Supabase Storage bucket
pub struct SupabaseStore {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStore {
    pub fn new(http: reqwest::Client, base_url: &str, service_key: &str, bucket: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, key)
    }

    async fn check(response: reqwest::Response) -> Result<(), StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Upstream { status: status.as_u16(), body })
    }
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn put(&self, key: &str, content_type: &str, body: Vec<u8>) -> Result<String, StorageError> {
        debug!("Uploading {} ({} bytes)", key, body.len());
        let response = self
            .http
            .post(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(body)
            .send()
            .await?;
        Self::check(response).await?;
        info!("Stored object {}", key);
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let response = self
            .http
            .delete(self.object_url(key))
            .bearer_auth(&self.service_key)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::Upstream {
                status: StatusCode::NOT_FOUND.as_u16(),
                body: format!("{} not found", key),
            });
        }
        Self::check(response).await?;
        info!("Deleted object {}", key);
        Ok(())
    }
}

/// Stand-in used when no bucket credentials are configured
pub struct DisabledStore;

#[async_trait]
impl ObjectStore for DisabledStore {
    async fn put(&self, _key: &str, _content_type: &str, _body: Vec<u8>) -> Result<String, StorageError> {
        Err(StorageError::NotConfigured)
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::NotConfigured)
    }
}

/// Build the configured object store
pub fn from_config(config: &StorageConfig, http: reqwest::Client) -> std::sync::Arc<dyn ObjectStore> {
    match (&config.url, &config.service_key) {
        (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
            std::sync::Arc::new(SupabaseStore::new(http, url, key, &config.bucket))
        }
        _ => std::sync::Arc::new(DisabledStore),
    }
}
