//! Response cache and the retry policy wrapped around external model
//! calls. Grounded in `ClaudeAgent.call_claude_api`: cache hit on fingerprint
//! match, exponential backoff on 429, fixed-delay retry on transport
//! failure, no retry on any other non-success status.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use tracing::{info, warn};

use crate::bus::SharedBus;
use crate::model_client::{ChatRequest, ChatResponse, ModelClient, ModelError};

const MAX_RETRIES: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("model call failed: {0}")]
    ModelCallFailed(#[from] ModelError),
}

/// Deterministic fingerprint of a request, used as the cache key's suffix.
/// A stable hash rather than the request's debug text, so semantically
/// identical requests always collide regardless of field order.
pub fn fingerprint(request: &ChatRequest) -> String {
    let canonical = serde_json::to_string(request).expect("ChatRequest always serializes");
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Wraps a `ModelClient` with the cache-then-call-then-retry policy shared
/// by every role that talks to an external model.
pub struct ResponseCache {
    bus: SharedBus,
    enabled: bool,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(bus: SharedBus, enabled: bool, ttl: Duration) -> Self {
        Self { bus, enabled, ttl }
    }

    /// Call through the cache, retrying on rate limits and transport
    /// errors. Returns an error only once every retry has been exhausted
    /// or the backend returned a non-retryable error.
    pub async fn call(
        &self,
        role: &str,
        client: &dyn ModelClient,
        request: &ChatRequest,
    ) -> Result<ChatResponse, CacheError> {
        let key = format!("cache:{role}:{}", fingerprint(request));

        if self.enabled {
            if let Some(cached) = self.bus.get(&key).await {
                if let Ok(response) = serde_json::from_str(&cached) {
                    info!(role, "cache hit");
                    return Ok(response);
                }
            }
        }

        let mut attempt = 0u32;
        loop {
            match client.call(request).await {
                Ok(response) => {
                    if self.enabled {
                        if let Ok(json) = serde_json::to_string(&response) {
                            self.bus.set(&key, &json, Some(self.ttl)).await;
                        }
                    }
                    return Ok(response);
                }
                Err(ModelError::RateLimited) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        warn!(role, "max retries reached after rate limiting, giving up");
                        return Err(CacheError::ModelCallFailed(ModelError::RateLimited));
                    }
                    let wait = Duration::from_secs(2u64.pow(attempt));
                    warn!(role, attempt, ?wait, "rate limited, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(ModelError::Transport(e)) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        warn!(role, error = %e, "max retries reached, giving up");
                        return Err(CacheError::ModelCallFailed(ModelError::Transport(e)));
                    }
                    warn!(role, error = %e, attempt, "transport error, retrying in 1s");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(ModelError::Timeout) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        warn!(role, "max retries reached after timeouts, giving up");
                        return Err(CacheError::ModelCallFailed(ModelError::Timeout));
                    }
                    warn!(role, attempt, "call timed out, retrying in 1s");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(ModelError::Http { status, body }) => {
                    warn!(role, status, body, "model call failed, not retrying");
                    return Err(CacheError::ModelCallFailed(ModelError::Http { status, body }));
                }
            }
        }
    }
}
