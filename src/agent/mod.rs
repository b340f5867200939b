//! Agent runtime: the responder/heartbeat/timeout loop shared by every
//! role, and the three concrete roles (moderator, arbiter, refiner).

pub mod arbiter;
pub mod moderator;
pub mod refiner;
pub mod runtime;

pub use arbiter::ArbiterRole;
pub use moderator::ModeratorRole;
pub use refiner::RefinerRole;
pub use runtime::{AgentRuntime, Role, RoleNotes};
