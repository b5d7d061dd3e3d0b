//! Turns a session's event log into an external representation for an
//! operator to inspect outside the database: either the raw log
//! (`events_jsonl`) or a human-readable transcript (`runbook_markdown`).

use ao_domain::error::Result;
use ao_domain::event::{Event, EventPayload, ToolResultStatus};

use crate::store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    EventsJsonl,
    RunbookMarkdown,
}

impl SessionStore {
    /// Render the full event log for `session_id` in the requested format.
    pub fn export(&self, session_id: &str, format: ExportFormat) -> Result<String> {
        let events = self.read_events(session_id, None, None)?;
        match format {
            ExportFormat::EventsJsonl => export_events_jsonl(&events),
            ExportFormat::RunbookMarkdown => Ok(export_runbook_markdown(session_id, &events)),
        }
    }
}

fn export_events_jsonl(events: &[Event]) -> Result<String> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}

fn export_runbook_markdown(session_id: &str, events: &[Event]) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Session {session_id}\n\n"));

    for event in events {
        match &event.payload {
            EventPayload::UserPrompt { text } => {
                out.push_str(&format!("## User (seq {})\n\n{text}\n\n", event.seq));
            }
            EventPayload::AssistantText { text } => {
                out.push_str(&format!("## Assistant (seq {})\n\n{text}\n\n", event.seq));
            }
            EventPayload::AssistantToolCall { calls } => {
                out.push_str(&format!("## Assistant tool calls (seq {})\n\n", event.seq));
                for call in calls {
                    out.push_str(&format!("- `{}` (`{}`): `{}`\n", call.tool_name, call.call_id, call.arguments));
                }
                out.push('\n');
            }
            EventPayload::PolicyDecision { call_id, tool_name, decision, reason, .. } => {
                out.push_str(&format!("_policy: {tool_name} (`{call_id}`) -> {decision} ({reason})_\n\n"));
            }
            EventPayload::ToolResult { call_id, status, output, error, .. } => {
                let status_str = match status {
                    ToolResultStatus::Ok => "ok",
                    ToolResultStatus::Error => "error",
                    ToolResultStatus::Denied => "denied",
                };
                out.push_str(&format!("## Tool result `{call_id}` ({status_str})\n\n"));
                if let Some(e) = error {
                    out.push_str(&format!("error: {e}\n\n"));
                } else {
                    out.push_str(&format!("```json\n{output}\n```\n\n"));
                }
            }
            EventPayload::Error { message } => {
                out.push_str(&format!("**error:** {message}\n\n"));
            }
            EventPayload::SessionMeta { key, value } => {
                out.push_str(&format!("_meta: {key} = {value}_\n\n"));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_domain::event::EventPayload;

    #[test]
    fn events_jsonl_round_trips_through_serde() {
        let store = SessionStore::open_in_memory().unwrap();
        let session_id = store.start_session().unwrap();
        store.append(&session_id, EventPayload::UserPrompt { text: "hi".into() }).unwrap();
        store.append(&session_id, EventPayload::AssistantText { text: "hello".into() }).unwrap();

        let rendered = store.export(&session_id, ExportFormat::EventsJsonl).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Event = serde_json::from_str(lines[0]).unwrap();
        assert!(matches!(first.payload, EventPayload::UserPrompt { .. }));
    }

    #[test]
    fn runbook_markdown_includes_user_and_assistant_text() {
        let store = SessionStore::open_in_memory().unwrap();
        let session_id = store.start_session().unwrap();
        store.append(&session_id, EventPayload::UserPrompt { text: "hi there".into() }).unwrap();
        store.append(&session_id, EventPayload::AssistantText { text: "hello back".into() }).unwrap();

        let rendered = store.export(&session_id, ExportFormat::RunbookMarkdown).unwrap();
        assert!(rendered.contains("hi there"));
        assert!(rendered.contains("hello back"));
        assert!(rendered.starts_with(&format!("# Session {session_id}")));
    }
}
