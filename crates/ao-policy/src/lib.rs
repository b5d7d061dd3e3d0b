//! Gates tool calls: decides allow/confirm/deny, redacts and records
//! the decision, and holds pending human-in-the-loop confirmations.

pub mod approval;
pub mod audit;
pub mod decisions;
pub mod engine;
pub mod redact;

pub use engine::{PolicyEngine, PolicyOutcome};
