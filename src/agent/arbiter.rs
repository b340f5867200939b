//! Arbiter role: owns the arbitration engine, reacts to responses and to
//! deadlock/loop/conclude moderation signals. Grounded on `ClaudeAgent`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::arbitration::{ArbitrationEngine, RoundOutcome};
use crate::bus::{ArbitrationStatus, ControlRecord, ModerationSignal, Response, Topic, WireMessage};
use crate::config::Config;
use crate::embedding::EmbeddingProvider;

use super::runtime::{Role, RoleNotes};

pub struct ArbiterRole {
    agent_name: String,
    engine: Arc<ArbitrationEngine>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl ArbiterRole {
    pub fn new(engine: Arc<ArbitrationEngine>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            agent_name: "Claude".to_string(),
            engine,
            embeddings,
        }
    }
}

#[async_trait]
impl Role for ArbiterRole {
    fn agent_name(&self) -> &str {
        &self.agent_name
    }

    fn notes(&self) -> RoleNotes {
        RoleNotes {
            role: "Arbitration & Reconciliation".to_string(),
            team_notes: "Evaluates responses with confidence metrics and determines consensus vs. further debate.".to_string(),
        }
    }

    async fn on_response(&self, response: Response, _config: &Config) -> Vec<(Topic, WireMessage)> {
        let round_outcome = match self
            .engine
            .record_response(response, self.embeddings.as_ref())
            .await
        {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "dropping malformed response");
                return Vec::new();
            }
        };

        let outcome = match round_outcome {
            RoundOutcome::Continue { debate_id, round, next_round } => {
                return vec![
                    (
                        Topic::Moderation,
                        WireMessage::ModerationSignal(ModerationSignal::new(
                            &self.agent_name,
                            "arbitration",
                            &self.agent_name,
                            &format!("Continue to round {next_round}"),
                            Some("continue"),
                        )),
                    ),
                    (
                        Topic::Moderation,
                        WireMessage::Control(ControlRecord {
                            debate_id,
                            round,
                            next_round,
                            timestamp: Utc::now(),
                        }),
                    ),
                ];
            }
            RoundOutcome::Decided(outcome) => outcome,
        };

        let round = outcome.round;
        let (message, flag) = match outcome.status {
            ArbitrationStatus::Consensus => (
                format!("Consensus reached in round {round}"),
                "consensus",
            ),
            ArbitrationStatus::StrongConfidence => (
                format!("Strong confidence differential in round {round}"),
                "strong_confidence",
            ),
            ArbitrationStatus::Concluded => (
                format!(
                    "Final decision: {} wins with confidence {}",
                    outcome.winning_agent.as_deref().unwrap_or("unknown"),
                    outcome.confidence
                ),
                "final_decision",
            ),
        };

        let signal_state = if outcome.status == ArbitrationStatus::Concluded {
            "conclude"
        } else {
            "arbitration"
        };

        vec![
            (
                Topic::Moderation,
                WireMessage::ModerationSignal(ModerationSignal::new(
                    &self.agent_name,
                    signal_state,
                    &self.agent_name,
                    &message,
                    Some(flag),
                )),
            ),
            (Topic::Arbitration, WireMessage::ArbitrationOutcome(outcome)),
        ]
    }

    async fn on_moderation(
        &self,
        signal: ModerationSignal,
        _config: &Config,
    ) -> Vec<(Topic, WireMessage)> {
        match signal.state.as_str() {
            "deadlock" => {
                let adjusted = self.engine.deadlock_adjusted_confidence_threshold();
                vec![(
                    Topic::Moderation,
                    WireMessage::ModerationSignal(ModerationSignal::new(
                        &self.agent_name,
                        "arbitration",
                        &self.agent_name,
                        &format!("Adjusting confidence threshold to {adjusted:.3} to break deadlock"),
                        Some("threshold_adjusted"),
                    )),
                )]
            }
            "loop_detected" => {
                let adjusted = self.engine.loop_adjusted_consensus_threshold();
                vec![(
                    Topic::Moderation,
                    WireMessage::ModerationSignal(ModerationSignal::new(
                        &self.agent_name,
                        "arbitration",
                        &self.agent_name,
                        &format!("Forcing decision with consensus threshold {adjusted:.3} to break loop"),
                        Some("forcing_decision"),
                    )),
                )]
            }
            "conclude" => {
                // A moderation signal carries no debate_id (see the wire
                // schema), so a broadcast `conclude` can't target a single
                // debate here. Per-debate forced conclusion is already
                // handled by the timeout check inside `record_response`.
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    async fn active_debate_count(&self) -> Option<usize> {
        Some(self.engine.active_debate_count().await)
    }
}
