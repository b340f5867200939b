//! Moderator role: owns the debate state machine, moderates turns, and
//! detects loops/deadlocks. Grounded on `GrokAgent`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::bus::{ControlRecord, ModerationSignal, Response, Topic, WireMessage};
use crate::config::Config;
use crate::debate::{DebateStateMachine, TurnOutcome};
use crate::embedding::EmbeddingProvider;

use super::runtime::{Role, RoleNotes};

pub struct ModeratorRole {
    agent_name: String,
    dsm: Mutex<DebateStateMachine>,
    embeddings: Arc<dyn EmbeddingProvider>,
    deadlock_detection_enabled: bool,
}

impl ModeratorRole {
    pub fn new(config: &Config, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            agent_name: "Grok".to_string(),
            dsm: Mutex::new(DebateStateMachine::new(config.max_history_size)),
            embeddings,
            deadlock_detection_enabled: config.enable_deadlock_detection,
        }
    }
}

#[async_trait]
impl Role for ModeratorRole {
    fn agent_name(&self) -> &str {
        &self.agent_name
    }

    fn notes(&self) -> RoleNotes {
        RoleNotes {
            role: "Moderation & Orchestration".to_string(),
            team_notes:
                "Enforces propose -> critique -> refine -> conclude, detects loops and deadlocks."
                    .to_string(),
        }
    }

    async fn on_response(&self, response: Response, _config: &Config) -> Vec<(Topic, WireMessage)> {
        let mut dsm = self.dsm.lock().await;
        let state = dsm.current_phase().to_string();
        let speaker = dsm.current_speaker().to_string();

        let mut outbound = vec![(
            Topic::Moderation,
            WireMessage::ModerationSignal(ModerationSignal::new(
                &self.agent_name,
                &state,
                &speaker,
                &response.content,
                None,
            )),
        )];

        match dsm.process_contribution(
            &response.content,
            self.deadlock_detection_enabled,
            self.embeddings.as_ref(),
        ) {
            TurnOutcome::LoopDetected => {
                outbound.push((
                    Topic::Moderation,
                    WireMessage::ModerationSignal(ModerationSignal::new(
                        &self.agent_name,
                        "loop_detected",
                        &speaker,
                        "Loop detected—pivoting.",
                        Some("loop_detected"),
                    )),
                ));
            }
            TurnOutcome::KillSwitch { summary } => {
                outbound.push((
                    Topic::Moderation,
                    WireMessage::ModerationSignal(ModerationSignal::new(
                        &self.agent_name,
                        "kill_switch",
                        &speaker,
                        &format!("Deadlock detected. Summary: {summary}"),
                        Some("kill_switch"),
                    )),
                ));
            }
            TurnOutcome::Advanced { phase, speaker } => {
                outbound.push((
                    Topic::Moderation,
                    WireMessage::ModerationSignal(ModerationSignal::new(
                        &self.agent_name,
                        &phase.to_string(),
                        &speaker.to_string(),
                        &format!("{} turn complete - next up.", response.agent),
                        None,
                    )),
                ));
            }
        }

        outbound
    }

    async fn on_moderation(
        &self,
        signal: ModerationSignal,
        _config: &Config,
    ) -> Vec<(Topic, WireMessage)> {
        let mut dsm = self.dsm.lock().await;
        match signal.state.as_str() {
            "continue" | "timeout" => {
                if let Err(e) = dsm.handle_moderation(&signal.state) {
                    warn!(error = %e, "dropping malformed moderation state");
                }
            }
            _ => {}
        }
        Vec::new()
    }

    /// A continue-round control record clears the DSM history for the new
    /// round without resetting the phase — the same transition the
    /// `"continue"` moderation state drives.
    async fn on_control(&self, _record: ControlRecord, _config: &Config) -> Vec<(Topic, WireMessage)> {
        let mut dsm = self.dsm.lock().await;
        if let Err(e) = dsm.handle_moderation("continue") {
            warn!(error = %e, "dropping malformed continue record");
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::StubEmbeddingProvider;
    use chrono::Utc;

    fn response(content: &str) -> Response {
        Response {
            debate_id: "d-1".to_string(),
            round: 1,
            agent: "Claude".to_string(),
            content: content.to_string(),
            confidence: 0.8,
            reasoning: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn on_response_emits_moderated_and_advance_signals() {
        let config = Config::default();
        let role = ModeratorRole::new(&config, Arc::new(StubEmbeddingProvider));
        let outbound = role.on_response(response("aaaaaaaa"), &config).await;
        assert_eq!(outbound.len(), 2);
        assert!(matches!(outbound[0].1, WireMessage::ModerationSignal(_)));
    }

    #[tokio::test]
    async fn continue_signal_clears_dsm_history() {
        let config = Config::default();
        let role = ModeratorRole::new(&config, Arc::new(StubEmbeddingProvider));
        role.on_response(response("aaaaaaaa"), &config).await;
        let signal = ModerationSignal::new("Grok", "continue", "Grok", "next round", None);
        role.on_moderation(signal, &config).await;
        let dsm = role.dsm.lock().await;
        assert!(dsm.history().is_empty());
    }

    #[tokio::test]
    async fn continue_control_record_clears_dsm_history() {
        let config = Config::default();
        let role = ModeratorRole::new(&config, Arc::new(StubEmbeddingProvider));
        role.on_response(response("aaaaaaaa"), &config).await;
        let record = ControlRecord {
            debate_id: "d-1".to_string(),
            round: 1,
            next_round: 2,
            timestamp: Utc::now(),
        };
        role.on_control(record, &config).await;
        let dsm = role.dsm.lock().await;
        assert!(dsm.history().is_empty());
    }
}
