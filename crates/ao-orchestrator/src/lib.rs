//! Drives one turn of the agent loop: pack context, stream from the
//! provider, assemble tool calls, gate them through policy, dispatch,
//! and repeat until the model stops asking for tools or a bound is
//! hit.

mod confirm;
mod turn;

pub use confirm::ConfirmOutcome;
pub use turn::{Orchestrator, OrchestratorConfig};
