//! Refiner role: calls the external model to polish a response, then
//! republishes it under its own name. Grounded on `GPTAgent`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::bus::{ModerationSignal, Response, Topic, WireMessage};
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::model_client::{ChatMessage, ChatRequest, ModelClient};

use super::runtime::{Role, RoleNotes};

pub struct RefinerRole {
    agent_name: String,
    client: Arc<dyn ModelClient>,
    cache: ResponseCache,
}

impl RefinerRole {
    pub fn new(client: Arc<dyn ModelClient>, cache: ResponseCache) -> Self {
        Self {
            agent_name: "GPT-4o".to_string(),
            client,
            cache,
        }
    }
}

#[async_trait]
impl Role for RefinerRole {
    fn agent_name(&self) -> &str {
        &self.agent_name
    }

    fn notes(&self) -> RoleNotes {
        RoleNotes {
            role: "Backend Operations & Response Refinement".to_string(),
            team_notes: "Refines responses for clarity and structures JSON output.".to_string(),
        }
    }

    async fn on_response(&self, response: Response, config: &Config) -> Vec<(Topic, WireMessage)> {
        let request = ChatRequest {
            model: config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "Refine this response for clarity and precision.".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: response.content.clone(),
                },
            ],
            max_tokens: 1000,
        };

        let refined = match self.cache.call(&self.agent_name, self.client.as_ref(), &request).await {
            Ok(refined) => refined,
            Err(e) => {
                warn!(error = %e, "dropping response, refinement call failed");
                return Vec::new();
            }
        };

        let output = Response {
            debate_id: response.debate_id,
            round: response.round,
            agent: self.agent_name.clone(),
            content: refined.content,
            confidence: response.confidence,
            reasoning: "Refined for maximum clarity and structured formatting.".to_string(),
            timestamp: Utc::now(),
        };

        vec![
            (Topic::Responses, WireMessage::Response(output)),
            (
                Topic::Moderation,
                WireMessage::ModerationSignal(ModerationSignal::new(
                    &self.agent_name,
                    "refinement",
                    &self.agent_name,
                    "Response refined and published",
                    Some("refined"),
                )),
            ),
        ]
    }

    async fn on_moderation(
        &self,
        _signal: ModerationSignal,
        _config: &Config,
    ) -> Vec<(Topic, WireMessage)> {
        Vec::new()
    }
}
