use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use ao_domain::error::Result;
use ao_domain::risk::RiskLevel;

use crate::backend::Backend;
use crate::registry::{PrivacyScope, Tool, ToolOutcome};

pub struct ResolveTarget {
    backend: Arc<dyn Backend>,
    schema: Value,
}

impl ResolveTarget {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            schema: json!({
                "type": "object",
                "properties": { "target": { "type": "string" } },
                "required": ["target"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl Tool for ResolveTarget {
    fn name(&self) -> &str {
        "resolve_target"
    }
    fn description(&self) -> &str {
        "Resolve a target host and report whether it's reachable."
    }
    fn risk(&self) -> RiskLevel {
        RiskLevel::ReadOnly
    }
    fn privacy_scope(&self) -> PrivacyScope {
        PrivacyScope::Network
    }
    fn parameters_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, arguments: Value, _cancel: CancellationToken) -> Result<ToolOutcome> {
        let target = match arguments.get("target").and_then(Value::as_str) {
            Some(t) => t,
            None => return Ok(ToolOutcome::Error("missing required argument: target".into())),
        };
        let info = self.backend.resolve(target).await?;
        Ok(ToolOutcome::Ok(serde_json::to_value(info)?))
    }
}

pub struct RunDiagnostic {
    backend: Arc<dyn Backend>,
    schema: Value,
}

impl RunDiagnostic {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            schema: json!({
                "type": "object",
                "properties": {
                    "target": { "type": "string" },
                    "action": { "type": "string" },
                    "args": { "type": "object" }
                },
                "required": ["target", "action"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl Tool for RunDiagnostic {
    fn name(&self) -> &str {
        "run_diagnostic"
    }
    fn description(&self) -> &str {
        "Run a named, non-destructive diagnostic action against a target."
    }
    fn risk(&self) -> RiskLevel {
        RiskLevel::Write
    }
    fn privacy_scope(&self) -> PrivacyScope {
        PrivacyScope::Network
    }
    fn parameters_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, arguments: Value, _cancel: CancellationToken) -> Result<ToolOutcome> {
        let target = match arguments.get("target").and_then(Value::as_str) {
            Some(t) => t,
            None => return Ok(ToolOutcome::Error("missing required argument: target".into())),
        };
        let action = match arguments.get("action").and_then(Value::as_str) {
            Some(a) => a,
            None => return Ok(ToolOutcome::Error("missing required argument: action".into())),
        };
        let args = arguments.get("args").cloned().unwrap_or_else(|| json!({}));
        let result = self.backend.run_diagnostic(target, action, &args).await?;
        Ok(ToolOutcome::Ok(result))
    }
}

pub struct RunShell {
    backend: Arc<dyn Backend>,
    schema: Value,
}

impl RunShell {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            schema: json!({
                "type": "object",
                "properties": {
                    "target": { "type": "string" },
                    "command": { "type": "string" }
                },
                "required": ["target", "command"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl Tool for RunShell {
    fn name(&self) -> &str {
        "run_shell"
    }
    fn description(&self) -> &str {
        "Run a shell command against a target. Requires confirmation by default."
    }
    fn risk(&self) -> RiskLevel {
        RiskLevel::Shell
    }
    fn privacy_scope(&self) -> PrivacyScope {
        PrivacyScope::Network
    }
    fn parameters_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, arguments: Value, _cancel: CancellationToken) -> Result<ToolOutcome> {
        let target = match arguments.get("target").and_then(Value::as_str) {
            Some(t) => t,
            None => return Ok(ToolOutcome::Error("missing required argument: target".into())),
        };
        let command = match arguments.get("command").and_then(Value::as_str) {
            Some(c) => c,
            None => return Ok(ToolOutcome::Error("missing required argument: command".into())),
        };
        match self.backend.run_shell(target, command).await {
            Ok(output) => Ok(ToolOutcome::Ok(serde_json::to_value(output)?)),
            Err(e) => Ok(ToolOutcome::Error(e.to_string())),
        }
    }
}
