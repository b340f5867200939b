//! Single-threaded cooperative event loop per agent process: a responder
//! loop, a heartbeat loop, and a timeout loop, run concurrently.
//!
//! Grounded on `BaseAgent.start` (`asyncio.gather` over the three loops).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

use tokio::sync::Mutex;

use crate::bus::{is_declared_role, ControlRecord, SharedBus, Topic, WireMessage};
use crate::config::Config;
use crate::heartbeat;
use crate::stream::ObserverStream;

/// Descriptor each role publishes to its `manus_killswitch_<role>_notes`
/// slot on startup.
#[derive(Debug, Clone, Serialize)]
pub struct RoleNotes {
    pub role: String,
    pub team_notes: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("response tagged with unrecognized agent role: {0}")]
    UnknownRole(String),
}

/// The agent-specific hooks the runtime drives. A role never touches the
/// bus subscription/heartbeat/timeout machinery directly — it only reacts
/// to the messages the runtime hands it.
#[async_trait]
pub trait Role: Send + Sync {
    fn agent_name(&self) -> &str;
    fn notes(&self) -> RoleNotes;

    /// React to a response published on the `responses` topic. Returns
    /// zero or more `(topic, message)` pairs to publish.
    async fn on_response(
        &self,
        response: crate::bus::Response,
        config: &Config,
    ) -> Vec<(Topic, WireMessage)>;

    /// React to a moderation signal published on the `moderation` topic.
    async fn on_moderation(
        &self,
        signal: crate::bus::ModerationSignal,
        config: &Config,
    ) -> Vec<(Topic, WireMessage)>;

    /// React to a continue-round control record published on the
    /// `moderation` topic. Only the moderator needs this; other roles keep
    /// the default no-op.
    async fn on_control(&self, _record: ControlRecord, _config: &Config) -> Vec<(Topic, WireMessage)> {
        Vec::new()
    }

    /// Extra health fields this role wants to expose (e.g. active debate
    /// count for the arbiter).
    async fn active_debate_count(&self) -> Option<usize> {
        None
    }
}

/// Drives one role's event loop against the bus.
pub struct AgentRuntime<R: Role> {
    role: R,
    bus: SharedBus,
    config: Arc<Config>,
    stream: Mutex<ObserverStream>,
}

impl<R: Role> AgentRuntime<R> {
    pub fn new(role: R, bus: SharedBus, config: Arc<Config>, stream: ObserverStream) -> Self {
        Self {
            role,
            bus,
            config,
            stream: Mutex::new(stream),
        }
    }

    /// Publish to the bus and, for moderation signals, mirror onto the
    /// observer stream — every moderation signal is meant to be seen, not
    /// just the ones the moderator itself emits.
    async fn publish(&self, topic: Topic, message: WireMessage) {
        if let WireMessage::ModerationSignal(signal) = &message {
            self.stream.lock().await.send(signal).await;
        }
        if let Err(e) = self.bus.publish(topic, message) {
            error!(error = %e, "dropping message, not valid on that topic");
        }
    }

    pub async fn publish_notes(&self) {
        let notes = self.role.notes();
        let json = serde_json::to_string(&notes).expect("RoleNotes always serializes");
        self.bus
            .set(&heartbeat::role_notes_key(self.role.agent_name()), &json, None)
            .await;
        info!(agent = self.role.agent_name(), "role notes published");
    }

    pub async fn health(&self) -> heartbeat::Health {
        heartbeat::health_check(
            &self.bus,
            self.role.agent_name(),
            self.role.active_debate_count().await,
        )
        .await
    }

    /// Runs the three loops concurrently until one of them exits (which,
    /// absent a process shutdown signal, never happens in production).
    pub async fn run(self: Arc<Self>) {
        self.publish_notes().await;

        let responder = Arc::clone(&self).responder_loop();
        let heartbeat = Arc::clone(&self).heartbeat_loop();
        let timeout = Arc::clone(&self).timeout_loop();

        tokio::join!(responder, heartbeat, timeout);
    }

    async fn responder_loop(self: Arc<Self>) {
        let mut responses_rx = self.bus.subscribe(Topic::Responses);
        let mut moderation_rx = self.bus.subscribe(Topic::Moderation);
        let mut arbitration_rx = self.bus.subscribe(Topic::Arbitration);

        loop {
            tokio::select! {
                msg = responses_rx.recv() => {
                    match msg {
                        Ok(WireMessage::Response(response)) => {
                            if !is_declared_role(&response.agent) {
                                warn!(
                                    error = %AgentError::UnknownRole(response.agent.clone()),
                                    "dropping malformed response"
                                );
                                continue;
                            }
                            let agent = response.agent.clone();
                            let outbound = self.role.on_response(response, &self.config).await;
                            for (topic, m) in outbound {
                                self.publish(topic, m).await;
                            }
                            info!(agent, "response processed");
                        }
                        Ok(_) => warn!("malformed message on responses topic, dropping"),
                        Err(e) => { error!(error = %e, "responses channel closed"); break; }
                    }
                }
                msg = moderation_rx.recv() => {
                    match msg {
                        Ok(WireMessage::ModerationSignal(signal)) => {
                            let outbound = self.role.on_moderation(signal, &self.config).await;
                            for (topic, m) in outbound {
                                self.publish(topic, m).await;
                            }
                        }
                        Ok(WireMessage::Control(record)) => {
                            let outbound = self.role.on_control(record, &self.config).await;
                            for (topic, m) in outbound {
                                self.publish(topic, m).await;
                            }
                        }
                        Ok(_) => warn!("malformed message on moderation topic, dropping"),
                        Err(e) => { error!(error = %e, "moderation channel closed"); break; }
                    }
                }
                msg = arbitration_rx.recv() => {
                    match msg {
                        Ok(WireMessage::ArbitrationOutcome(outcome)) => {
                            info!(debate_id = outcome.debate_id, status = ?outcome.status, "arbitration result received");
                        }
                        Ok(_) => warn!("malformed message on arbitration topic, dropping"),
                        Err(e) => { error!(error = %e, "arbitration channel closed"); break; }
                    }
                }
            }
        }
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        loop {
            heartbeat::beat(&self.bus, self.role.agent_name(), &self.config).await;
            tokio::time::sleep(self.config.heartbeat_interval).await;
        }
    }

    async fn timeout_loop(self: Arc<Self>) {
        loop {
            tokio::time::sleep(self.config.debate_timeout).await;
            let signal = crate::bus::ModerationSignal::new(
                self.role.agent_name(),
                "timeout",
                self.role.agent_name(),
                "Debate timeout reached—forcing conclusion",
                Some("timeout"),
            );
            self.publish(Topic::Moderation, WireMessage::ModerationSignal(signal))
                .await;
        }
    }
}
