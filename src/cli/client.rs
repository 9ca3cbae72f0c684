use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::cli::state::{ServerInfo, ServerStatus, SessionState};

/// Thin REST client over the current server and session
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("board/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_state(state: &SessionState) -> anyhow::Result<Self> {
        let (_, server) = state.current()?;
        Self::new(&server.url, state.token().map(String::from))
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<Value> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<Value> {
        self.send(Method::DELETE, path, None).await
    }

    /// Send a raw body (uploads)
    pub async fn post_bytes(&self, path: &str, content_type: &str, body: Vec<u8>) -> anyhow::Result<Value> {
        let request = self
            .request(Method::POST, path)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        unwrap_envelope(request.send().await?).await
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> anyhow::Result<Value> {
        tracing::debug!("{} {}", method, path);
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        unwrap_envelope(request.send().await?).await
    }
}

/// `data` from a success envelope; the error envelope becomes an `anyhow` error
async fn unwrap_envelope(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    let text = response.text().await?;
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
    envelope_data(status, body)
}

fn envelope_data(status: StatusCode, body: Value) -> anyhow::Result<Value> {
    if status.is_success() {
        return Ok(body.get("data").cloned().unwrap_or(body));
    }

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| body.to_string());
    let mut detail = format!("{} ({})", message, status);
    if let Some(Value::Object(fields)) = body.get("field_errors") {
        for (field, msg) in fields {
            detail.push_str(&format!("\n  {}: {}", field, msg.as_str().unwrap_or_default()));
        }
    }
    Err(anyhow::anyhow!(detail))
}

pub async fn ping_server(server_info: &ServerInfo) -> ServerStatus {
    let client = reqwest::Client::new();
    let url = format!("{}/health", server_info.url);

    match client.get(&url).timeout(Duration::from_secs(5)).send().await {
        Ok(response) if response.status().is_success() => ServerStatus::Up,
        _ => ServerStatus::Down,
    }
}
