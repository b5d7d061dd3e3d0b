pub mod backend;
pub mod builtin;
pub mod registry;
pub mod schema;

pub use backend::{Backend, LocalBackend};
pub use registry::{PrivacyScope, Tool, ToolOutcome, ToolRegistry, ToolRegistryBuilder};
