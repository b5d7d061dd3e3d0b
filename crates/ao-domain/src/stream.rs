use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::message::ToolCall;

/// A boxed async stream, used for provider and orchestrator streaming.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Token usage for a completion, when the provider reports it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A raw chunk emitted by a streaming LLM provider, before assembly.
///
/// `tool_call_delta` carries whichever fields the provider included in
/// this particular chunk; the assembler accumulates them by `index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderChunk {
    #[serde(rename = "content_delta")]
    ContentDelta { text: String },

    #[serde(rename = "tool_call_delta")]
    ToolCallDelta {
        index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        args_chunk: Option<String>,
    },

    #[serde(rename = "done")]
    Done {
        finish_reason: Option<String>,
        usage: Option<Usage>,
    },
}

/// A decision the policy engine rendered for one tool call, surfaced
/// to the caller alongside the orchestrator's stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecisionChunk {
    pub call_id: String,
    pub tool_name: String,
    pub decision: String,
    pub reason: String,
}

/// One unit of the orchestrator's output stream. The sequence is
/// finite and terminates on `TurnComplete` or a fatal `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamChunk {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },

    #[serde(rename = "tool_call_started")]
    ToolCallStarted { call_id: String, tool_name: String },

    #[serde(rename = "tool_call_arguments_delta")]
    ToolCallArgumentsDelta { call_id: String, delta: String },

    #[serde(rename = "tool_call_completed")]
    ToolCallCompleted { call: ToolCall },

    #[serde(rename = "policy_decision")]
    PolicyDecision(PolicyDecisionChunk),

    #[serde(rename = "tool_result")]
    ToolResult {
        call_id: String,
        status: String,
        output: serde_json::Value,
    },

    #[serde(rename = "turn_complete")]
    TurnComplete,

    #[serde(rename = "error")]
    Error { message: String },
}
