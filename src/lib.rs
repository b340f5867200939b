//! Debate orchestration core
//!
//! Coordinates three agent roles — moderator, arbiter, refiner — through a
//! bounded, cyclic debate state machine and a confidence/consensus-driven
//! arbitration engine, communicating over a pub/sub message bus and
//! streaming moderation signals out to an observer.
//!
//! # Roles
//! - Moderator (`agent::ModeratorRole`): drives the propose/critique/
//!   refine/conclude cycle, detects loops and deadlocks.
//! - Arbiter (`agent::ArbiterRole`): aggregates per-round responses and
//!   decides consensus, strong confidence, continuation, or conclusion.
//! - Refiner (`agent::RefinerRole`): calls an external model to polish a
//!   response and republishes it under its own name.

#![allow(clippy::uninlined_format_args)]

pub mod agent;
pub mod arbitration;
pub mod bus;
pub mod cache;
pub mod config;
pub mod debate;
pub mod embedding;
pub mod heartbeat;
pub mod model_client;
pub mod stream;

pub use agent::{AgentRuntime, ArbiterRole, ModeratorRole, RefinerRole, Role, RoleNotes};
pub use arbitration::ArbitrationEngine;
pub use bus::{InMemoryBus, SharedBus, Topic, WireMessage};
pub use config::Config;
pub use debate::DebateStateMachine;
