//! External model collaborator: the chat-completion backend each refiner
//! or arbiter role calls out to. Concrete backends (Claude, GPT, Grok) are
//! external services; this module only defines the interface and an HTTP
//! implementation against it, matching the original's `httpx` calls.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const MODEL_CALL_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(default)]
    pub raw: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("rate limited")]
    RateLimited,
    #[error("model call failed: {status} {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model call timed out")]
    Timeout,
}

/// Capability interface for the external chat-completion backend. Kept
/// separate from the retry/cache wrapper in `cache.rs` so tests can supply
/// a deterministic stub.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn call(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError>;
}

/// Real HTTP-backed client, one per role (each role has its own API key
/// and base URL per the original's per-agent `CONFIG["API_URL"]`).
pub struct HttpModelClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    auth_header: AuthStyle,
}

#[derive(Debug, Clone, Copy)]
pub enum AuthStyle {
    /// `x-api-key: <key>` (Claude/Grok style).
    ApiKeyHeader,
    /// `Authorization: Bearer <key>` (GPT style).
    Bearer,
}

impl HttpModelClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, auth: AuthStyle) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            auth_header: auth,
        }
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn call(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError> {
        let mut builder = self.http.post(&self.api_url).json(request);
        builder = match self.auth_header {
            AuthStyle::ApiKeyHeader => builder.header("x-api-key", &self.api_key),
            AuthStyle::Bearer => builder.bearer_auth(&self.api_key),
        };

        let response = tokio::time::timeout(MODEL_CALL_DEADLINE, builder.send())
            .await
            .map_err(|_| ModelError::Timeout)??;

        match response.status().as_u16() {
            200 => {
                let body: serde_json::Value = response.json().await?;
                let content = extract_content(&body);
                Ok(ChatResponse { content, raw: body })
            }
            429 => Err(ModelError::RateLimited),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ModelError::Http { status, body })
            }
        }
    }
}

/// Best-effort extraction across the two shapes the original providers
/// returned (`choices[0].message.content` for GPT-style, or a plain
/// `content` field for Claude-style responses).
fn extract_content(body: &serde_json::Value) -> String {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .or_else(|| body.get("content").and_then(|c| c.as_str()))
        .unwrap_or_default()
        .to_string()
}
