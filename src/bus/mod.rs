//! Pub/sub bus abstraction: topics, tagged wire messages, and the
//! in-process broker that stands in for the external durable bus.

pub mod adapter;
pub mod types;

pub use adapter::{BusError, BusResult, InMemoryBus, SharedBus};
pub use types::{
    is_declared_role, ArbitrationOutcome, ArbitrationStatus, ControlRecord, DissentingView,
    ModerationSignal, Response, Topic, WireMessage, DECLARED_ROLES,
};
