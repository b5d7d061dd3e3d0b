use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::ToolCall;
use crate::risk::RiskLevel;

/// The atomic, immutable unit of a session's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub session_id: String,
    pub seq: i64,
    pub created_at: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventPayload {
    #[serde(rename = "user_prompt")]
    UserPrompt { text: String },

    #[serde(rename = "assistant_text")]
    AssistantText { text: String },

    #[serde(rename = "assistant_tool_call")]
    AssistantToolCall { calls: Vec<ToolCall> },

    #[serde(rename = "tool_result")]
    ToolResult {
        call_id: String,
        status: ToolResultStatus,
        output: serde_json::Value,
        #[serde(default)]
        artifact_refs: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "policy_decision")]
    PolicyDecision {
        call_id: String,
        tool_name: String,
        risk: RiskLevel,
        decision: PolicyVerdict,
        reason: String,
        args_redacted: serde_json::Value,
    },

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "session_meta")]
    SessionMeta {
        key: String,
        value: serde_json::Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultStatus {
    Ok,
    Error,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyVerdict {
    Allow,
    Confirm,
    Deny,
}

impl std::fmt::Display for PolicyVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PolicyVerdict::Allow => "allow",
            PolicyVerdict::Confirm => "confirm",
            PolicyVerdict::Deny => "deny",
        };
        f.write_str(s)
    }
}

impl EventPayload {
    /// The `call_id` this event references, if any. Used to check the
    /// session-log invariant that every `tool_result` has a prior
    /// `assistant_tool_call` with a matching call id.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            EventPayload::ToolResult { call_id, .. } => Some(call_id.as_str()),
            EventPayload::PolicyDecision { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        }
    }
}
