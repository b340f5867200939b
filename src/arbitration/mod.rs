//! Arbitration engine: response aggregation, consensus/strong-confidence/
//! max-rounds decision procedure, and final arbitration.

pub mod engine;

pub use engine::{ArbitrationEngine, ArbitrationError, ArbitrationResult, DebateStatus, RoundOutcome};
