use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::ImageSearchConfig;

#[derive(Debug, Error)]
pub enum ImageSearchError {
    #[error("Image search is not configured")]
    NotConfigured,

    #[error("Image search returned {0}")]
    Upstream(u16),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageResult {
    pub id: String,
    pub description: Option<String>,
    pub url: String,
    pub thumb: String,
}

// Unsplash-compatible response shape
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
    description: Option<String>,
    alt_description: Option<String>,
    urls: HitUrls,
}

#[derive(Debug, Deserialize)]
struct HitUrls {
    regular: String,
    thumb: String,
}

impl From<SearchHit> for ImageResult {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id,
            description: hit.description.or(hit.alt_description),
            url: hit.urls.regular,
            thumb: hit.urls.thumb,
        }
    }
}

/// Proxies photo search so the API key never reaches clients
pub struct ImageService {
    http: reqwest::Client,
    config: ImageSearchConfig,
}

impl ImageService {
    pub fn new(http: reqwest::Client, config: ImageSearchConfig) -> Self {
        Self { http, config }
    }

    /// `per_page` is clamped to `1..=max_per_page`
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(10).clamp(1, self.config.max_per_page.max(1))
    }

    pub async fn search(&self, query: &str, per_page: Option<u32>) -> Result<Vec<ImageResult>, ImageSearchError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ImageSearchError::NotConfigured)?;

        let per_page = self.page_size(per_page).to_string();
        debug!("Image search '{}' ({} per page)", query, per_page);
        let response = self
            .http
            .get(&self.config.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("Client-ID {}", key))
            .query(&[("query", query), ("per_page", per_page.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ImageSearchError::Upstream(response.status().as_u16()));
        }
        let body: SearchResponse = response.json().await?;
        Ok(body.results.into_iter().map(ImageResult::from).collect())
    }
}
