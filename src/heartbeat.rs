//! Heartbeat helpers shared by every agent runtime.
//!
//! Grounded on `BaseAgent._heartbeat` / `health_check`: each role refreshes
//! its own `<role>_heartbeat` key on an interval, with a TTL longer than
//! the interval so a single missed tick doesn't read as dead.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bus::SharedBus;
use crate::config::Config;

pub fn heartbeat_key(role: &str) -> String {
    format!("{}_heartbeat", role.to_lowercase())
}

pub fn role_notes_key(role: &str) -> String {
    format!("manus_killswitch_{}_notes", role.to_lowercase())
}

/// One heartbeat tick, refreshing the role's keyed slot with its TTL.
pub async fn beat(bus: &SharedBus, role: &str, config: &Config) {
    bus.set(&heartbeat_key(role), "alive", Some(config.heartbeat_expiry))
        .await;
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub agent: String,
    pub status: &'static str,
    pub last_heartbeat: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub active_debates: Option<usize>,
}

pub async fn health_check(bus: &SharedBus, role: &str, active_debates: Option<usize>) -> Health {
    let last = bus.get(&heartbeat_key(role)).await;
    Health {
        agent: role.to_string(),
        status: if last.is_some() { "alive" } else { "stale" },
        last_heartbeat: last,
        timestamp: Utc::now(),
        active_debates,
    }
}
