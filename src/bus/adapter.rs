//! In-process pub/sub bus with keyed, TTL-expiring values.
//!
//! Stands in for the external durable bus (Redis in the original design):
//! broadcast channels per topic for pub/sub, and a keyed store for the
//! ephemeral values (heartbeats, cache entries, debate/speaker state) that
//! the original kept in Redis string keys with `EX`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use super::types::{Topic, WireMessage};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("{kind} does not belong on the {topic} topic")]
    TopicMismatch { topic: Topic, kind: &'static str },
}

pub type BusResult<T> = Result<T, BusError>;

/// Which topic a `WireMessage` variant is allowed to be published on.
/// Mirrors the original's per-channel Redis `PUBLISH` calls, each of which
/// only ever carried one kind of payload (plus `Control` sharing the
/// moderation channel for the continue-round signal).
fn topic_accepts(topic: Topic, message: &WireMessage) -> bool {
    matches!(
        (topic, message),
        (Topic::Responses, WireMessage::Response(_))
            | (Topic::Moderation, WireMessage::ModerationSignal(_))
            | (Topic::Moderation, WireMessage::Control(_))
            | (Topic::Arbitration, WireMessage::ArbitrationOutcome(_))
    )
}

fn message_kind(message: &WireMessage) -> &'static str {
    match message {
        WireMessage::Response(_) => "a response",
        WireMessage::ModerationSignal(_) => "a moderation signal",
        WireMessage::ArbitrationOutcome(_) => "an arbitration outcome",
        WireMessage::Control(_) => "a control record",
    }
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// Shared handle to the message bus, cloned into every agent runtime.
pub type SharedBus = Arc<InMemoryBus>;

/// A single-process stand-in for the external pub/sub broker. All topics
/// share one broadcast channel capacity; the keyed store backs heartbeats,
/// the response cache, and small bits of shared debate state.
pub struct InMemoryBus {
    responses: broadcast::Sender<WireMessage>,
    moderation: broadcast::Sender<WireMessage>,
    arbitration: broadcast::Sender<WireMessage>,
    store: Mutex<HashMap<String, Entry>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            responses: broadcast::channel(CHANNEL_CAPACITY).0,
            moderation: broadcast::channel(CHANNEL_CAPACITY).0,
            arbitration: broadcast::channel(CHANNEL_CAPACITY).0,
            store: Mutex::new(HashMap::new()),
        }
    }

    pub fn shared() -> SharedBus {
        Arc::new(Self::new())
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<WireMessage> {
        match topic {
            Topic::Responses => &self.responses,
            Topic::Moderation => &self.moderation,
            Topic::Arbitration => &self.arbitration,
        }
    }

    /// Publish a message. As in the original Redis `PUBLISH`, having no
    /// subscribers is not an error — only publishing a variant that
    /// doesn't belong on `topic` is.
    pub fn publish(&self, topic: Topic, message: WireMessage) -> BusResult<()> {
        if !topic_accepts(topic, &message) {
            return Err(BusError::TopicMismatch {
                topic,
                kind: message_kind(&message),
            });
        }
        let count = self.sender(topic).send(message).unwrap_or(0);
        debug!(%topic, receivers = count, "published");
        Ok(())
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<WireMessage> {
        self.sender(topic).subscribe()
    }

    /// Set a key with an optional TTL (`None` means it never expires until
    /// overwritten), mirroring Redis `SET key value [EX seconds]`.
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let mut store = self.store.lock().await;
        store.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
    }

    /// Get a key's value, returning `None` if absent or expired. Expired
    /// entries are lazily evicted on read.
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut store = self.store.lock().await;
        match store.get(key) {
            Some(entry) => {
                if let Some(exp) = entry.expires_at {
                    if Instant::now() >= exp {
                        store.remove(key);
                        return None;
                    }
                }
                Some(entry.value.clone())
            }
            None => None,
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::types::{ControlRecord, WireMessage};

    #[tokio::test]
    async fn publish_subscribe_round_trip() {
        let bus = InMemoryBus::new();
        let mut rx = bus.subscribe(Topic::Moderation);
        bus.publish(
            Topic::Moderation,
            WireMessage::Control(ControlRecord {
                debate_id: "d-1".into(),
                round: 1,
                next_round: 2,
                timestamp: chrono::Utc::now(),
            }),
        )
        .unwrap();
        let msg = rx.recv().await.unwrap();
        matches!(msg, WireMessage::Control(_));
    }

    #[tokio::test]
    async fn publish_rejects_variant_on_the_wrong_topic() {
        let bus = InMemoryBus::new();
        let err = bus
            .publish(
                Topic::Responses,
                WireMessage::Control(ControlRecord {
                    debate_id: "d-1".into(),
                    round: 1,
                    next_round: 2,
                    timestamp: chrono::Utc::now(),
                }),
            )
            .unwrap_err();
        assert!(matches!(err, BusError::TopicMismatch { topic: Topic::Responses, .. }));
    }

    #[tokio::test]
    async fn keyed_value_expires_after_ttl() {
        let bus = InMemoryBus::new();
        bus.set("grok_heartbeat", "alive", Some(Duration::from_millis(20)))
            .await;
        assert_eq!(bus.get("grok_heartbeat").await.as_deref(), Some("alive"));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(bus.get("grok_heartbeat").await, None);
    }

    #[tokio::test]
    async fn keyed_value_without_ttl_persists() {
        let bus = InMemoryBus::new();
        bus.set("debate_state", "propose", None).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(bus.get("debate_state").await.as_deref(), Some("propose"));
    }
}
