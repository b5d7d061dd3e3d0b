use serde::Serialize;

/// Structured trace events emitted across all agentops crates.
///
/// Each variant is serialized to a single JSON line and attached to a
/// `tracing::info!` record under the `trace_event` field, so any
/// `tracing-subscriber` layer (json, fmt, or otherwise) picks it up
/// without this crate depending on a particular sink.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_id: String,
        is_new: bool,
    },
    SessionMetaChanged {
        session_id: String,
        key: String,
    },
    TurnStarted {
        session_id: String,
        turn_index: u32,
    },
    TurnCompleted {
        session_id: String,
        turn_index: u32,
        duration_ms: u64,
    },
    ProviderRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    ToolDispatched {
        call_id: String,
        tool_name: String,
        risk: String,
    },
    PolicyDecision {
        call_id: String,
        tool_name: String,
        decision: String,
        reason: String,
    },
    EventAppended {
        session_id: String,
        seq: i64,
        kind: String,
    },
    ContextPacked {
        session_id: String,
        messages_included: usize,
        events_dropped: usize,
        estimated_tokens: usize,
    },
    AuditRotated {
        path: String,
        bytes: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ao_event");
    }
}
