//! The debate state machine: phases, speaker rotation, loop/deadlock
//! detection, and the kill switch.
//!
//! ```text
//! propose → critique → refine → conclude → propose → ...
//! ```
//!
//! Phases never terminate on their own — the arbitration engine decides
//! when a debate concludes, not this state machine.

pub mod state;

pub use state::{
    BoundedHistory, DebatePhase, DebateStateMachine, DsmError, Speaker, TurnOutcome,
    DEADLOCK_TURNS, LOOP_SIMILARITY_THRESHOLD,
};
