use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use ao_domain::error::Result;
use ao_domain::message::ToolDefinition;
use ao_domain::risk::RiskLevel;

/// Scope tools declare for which data a call may touch, distinct from
/// `risk` (which governs mutation/destructiveness). Not yet enforced
/// by the policy engine beyond being carried through to the audit
/// trail; kept as a closed enum so a future gating rule can switch on
/// it without a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyScope {
    /// Operates only on the local machine/session.
    Local,
    /// May cause outbound network traffic.
    Network,
}

/// Outcome of a successful `execute` call. Errors that should be
/// reported to the model (not ones that abort the turn) are carried
/// here rather than as a `Result::Err`.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Ok(Value),
    Error(String),
}

/// A registered, callable tool. `execute` is asynchronous and accepts
/// a cancellation token so a caller abandoning the turn can unwind an
/// in-flight call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn risk(&self) -> RiskLevel;
    fn privacy_scope(&self) -> PrivacyScope;
    fn parameters_schema(&self) -> &Value;

    async fn execute(&self, arguments: Value, cancel: CancellationToken) -> Result<ToolOutcome>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition { name: self.name().to_string(), description: self.description().to_string(), parameters: self.parameters_schema().clone() }
    }
}

/// Tools are registered once at startup and immutable thereafter —
/// the registry only ever grows during construction, never after
/// `build()`.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: Arc::new(self.tools) }
    }
}

#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}
