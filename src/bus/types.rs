//! Wire types carried over the message bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A topic on the bus. Mirrors the three Redis channels of the original
/// design plus the control channel used for heartbeats and role notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Responses,
    Moderation,
    Arbitration,
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Responses => write!(f, "responses"),
            Self::Moderation => write!(f, "moderation"),
            Self::Arbitration => write!(f, "arbitration"),
        }
    }
}

/// A single agent's contribution in a debate round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub debate_id: String,
    pub round: u32,
    pub agent: String,
    pub content: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

fn default_confidence() -> f64 {
    0.7
}

/// A moderation signal emitted by the debate state machine or the timeout
/// monitor, and streamed out to the observer connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationSignal {
    pub timestamp: DateTime<Utc>,
    pub state: String,
    pub speaker: String,
    pub message: String,
    pub flag: Option<String>,
    pub log: String,
}

impl ModerationSignal {
    pub fn new(agent_name: &str, state: &str, speaker: &str, message: &str, flag: Option<&str>) -> Self {
        let mut state_cap = state.to_string();
        if let Some(c) = state_cap.get_mut(0..1) {
            c.make_ascii_uppercase();
        }
        Self {
            timestamp: Utc::now(),
            state: state.to_string(),
            speaker: speaker.to_string(),
            message: message.to_string(),
            flag: flag.map(|s| s.to_string()),
            log: format!("{agent_name}: {state_cap} phase—{speaker} up: {message}"),
        }
    }
}

/// Outcome of a round or final arbitration decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationOutcome {
    pub debate_id: String,
    pub round: u32,
    pub status: ArbitrationStatus,
    pub content: String,
    pub confidence: f64,
    pub contributing_agents: Vec<String>,
    pub winning_agent: Option<String>,
    pub dissenting_view: Option<DissentingView>,
    pub next_round: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationStatus {
    Consensus,
    StrongConfidence,
    Concluded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DissentingView {
    pub agent: String,
    pub content: String,
    pub confidence: f64,
}

/// A round that can't yet be decided: published on the moderation topic
/// instead of an `ArbitrationOutcome`, since "continue" isn't a terminal
/// status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRecord {
    pub debate_id: String,
    pub round: u32,
    pub next_round: u32,
    pub timestamp: DateTime<Utc>,
}

/// The three DSM-declared roles a `Response.agent` is allowed to name.
/// Anything else is malformed — the agent has no place in the debate.
pub const DECLARED_ROLES: [&str; 3] = ["Grok", "Claude", "GPT-4o"];

pub fn is_declared_role(agent: &str) -> bool {
    DECLARED_ROLES.contains(&agent)
}

/// The tagged sum of everything that can travel over the bus. Unknown
/// variants at the wire boundary are rejected as malformed rather than
/// silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    Response(Response),
    ModerationSignal(ModerationSignal),
    ArbitrationOutcome(ArbitrationOutcome),
    Control(ControlRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderation_signal_log_format() {
        let sig = ModerationSignal::new("Grok", "propose", "Claude", "go ahead", None);
        assert_eq!(sig.log, "Grok: Propose phase—Claude up: go ahead");
    }

    #[test]
    fn wire_message_round_trips_through_json() {
        let msg = WireMessage::Control(ControlRecord {
            debate_id: "d-1".to_string(),
            round: 1,
            next_round: 2,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"control\""));
        let back: WireMessage = serde_json::from_str(&json).unwrap();
        matches!(back, WireMessage::Control(_));
    }

    #[test]
    fn unknown_variant_is_rejected() {
        let raw = r#"{"type":"something_else"}"#;
        let result: Result<WireMessage, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }

    #[test]
    fn declared_role_check_accepts_only_the_three_dsm_roles() {
        assert!(is_declared_role("Grok"));
        assert!(is_declared_role("Claude"));
        assert!(is_declared_role("GPT-4o"));
        assert!(!is_declared_role("Gemini"));
    }
}
