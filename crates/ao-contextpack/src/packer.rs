use std::collections::{HashMap, HashSet};

use ao_domain::event::{Event, EventPayload, ToolResultStatus};
use ao_domain::message::Message;

use crate::tokens::{CharsOverFour, TokenCounter};

/// Report describing what a pack call included or dropped, useful for
/// diagnostics and for the same kind of machine-readable summary the
/// workspace context builder returns alongside its assembled string.
#[derive(Debug, Clone)]
pub struct PackReport {
    pub messages_included: usize,
    pub events_considered: usize,
    pub events_dropped: usize,
    pub estimated_tokens: usize,
    pub orphaned_tool_calls_dropped: usize,
}

pub struct ContextPacker {
    counter: Box<dyn TokenCounter>,
}

impl Default for ContextPacker {
    fn default() -> Self {
        Self { counter: Box::new(CharsOverFour) }
    }
}

impl ContextPacker {
    pub fn new(counter: Box<dyn TokenCounter>) -> Self {
        Self { counter }
    }

    /// Build the message list for the next model call.
    ///
    /// `events` must be in ascending `seq` order (as returned by the
    /// store). `system_prompt` is prepended unconditionally and does
    /// not count against the walk's per-message budget logic beyond
    /// being subtracted from the available budget up front.
    pub fn pack(&self, system_prompt: &str, events: &[Event], token_budget: usize, reserve_for_response: usize) -> (Vec<Message>, PackReport) {
        let system_tokens = self.counter.count(system_prompt);
        let mut remaining_budget = token_budget.saturating_sub(reserve_for_response).saturating_sub(system_tokens);

        // First pass: walk backward (most recent first), greedily
        // selecting events that fit.
        let mut selected: HashMap<i64, &Event> = HashMap::new();

        for event in events.iter().rev() {
            let rendered = render_event(event);
            let Some(rendered) = rendered else { continue };
            let cost = self.counter.count(&rendered);

            if cost > remaining_budget {
                break;
            }

            remaining_budget -= cost;
            selected.insert(event.seq, event);
        }

        // Second pass: enforce the tool_call/tool_result pairing
        // invariant. A `tool_result` always has a higher `seq` than
        // the `assistant_tool_call` that produced it, so the backward
        // walk above visits (and can keep) a result before it reaches
        // — and may drop — its call. A kept `assistant_tool_call`
        // always has its result visited and kept first, so the only
        // orphan that can occur here is a kept result whose producing
        // call didn't make the cut; drop those.
        let mut included_call_ids: HashSet<&str> = HashSet::new();
        for event in selected.values() {
            if let EventPayload::AssistantToolCall { calls } = &event.payload {
                for call in calls {
                    included_call_ids.insert(call.call_id.as_str());
                }
            }
        }

        let mut orphaned_tool_calls_dropped = 0;
        let mut drop_seqs: Vec<i64> = Vec::new();
        for event in selected.values() {
            if let EventPayload::ToolResult { call_id, .. } = &event.payload {
                if !included_call_ids.contains(call_id.as_str()) {
                    drop_seqs.push(event.seq);
                    orphaned_tool_calls_dropped += 1;
                }
            }
        }
        for seq in &drop_seqs {
            selected.remove(seq);
        }

        let mut ordered: Vec<&Event> = selected.into_values().collect();
        ordered.sort_by_key(|e| e.seq);

        let mut messages = vec![Message::system(system_prompt)];
        for event in &ordered {
            messages.extend(event_to_message(event));
        }

        let estimated_tokens = system_tokens + messages[1..].iter().map(|m| self.counter.count(&render_message(m))).sum::<usize>();

        let report = PackReport {
            messages_included: messages.len(),
            events_considered: events.len(),
            events_dropped: events.len() - ordered.len(),
            estimated_tokens,
            orphaned_tool_calls_dropped,
        };

        (messages, report)
    }
}

fn render_event(event: &Event) -> Option<String> {
    match &event.payload {
        EventPayload::UserPrompt { text } => Some(text.clone()),
        EventPayload::AssistantText { text } => Some(text.clone()),
        EventPayload::AssistantToolCall { calls } => Some(
            calls
                .iter()
                .map(|c| format!("{}{}", c.tool_name, c.arguments))
                .collect::<Vec<_>>()
                .join(" "),
        ),
        EventPayload::ToolResult { output, .. } => Some(output.to_string()),
        EventPayload::PolicyDecision { .. } | EventPayload::Error { .. } | EventPayload::SessionMeta { .. } => None,
    }
}

fn render_message(message: &Message) -> String {
    message.content.extract_all_text()
}

fn event_to_message(event: &Event) -> Option<Message> {
    match &event.payload {
        EventPayload::UserPrompt { text } => Some(Message::user(text)),
        EventPayload::AssistantText { text } => Some(Message::assistant_text(text)),
        EventPayload::AssistantToolCall { calls } => Some(Message::assistant_tool_calls(calls)),
        EventPayload::ToolResult { call_id, status, output, error, .. } => {
            let is_error = *status != ToolResultStatus::Ok;
            let content = error.clone().unwrap_or_else(|| output.to_string());
            Some(Message::tool_result(call_id, content, is_error))
        }
        EventPayload::PolicyDecision { .. } | EventPayload::Error { .. } | EventPayload::SessionMeta { .. } => None,
    }
}
