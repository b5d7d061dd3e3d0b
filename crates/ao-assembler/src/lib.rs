//! Reconstructs complete, validated tool calls from a stream of
//! per-index deltas emitted by a provider.
//!
//! Unlike a best-effort port, this assembler never silently repairs a
//! malformed call: a missing id/name or an unparseable arguments
//! buffer is a [`AssemblerError`], not a default empty object. The
//! model's control channel has to be verifiable.

use std::collections::HashMap;

use ao_domain::message::ToolCall;
use ao_domain::stream::ProviderChunk;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AssemblerError {
    #[error("tool call at index {index} finished without an id or name")]
    MissingIdentity { index: usize },
    #[error("tool call {call_id} arguments did not parse as a JSON object: {detail}")]
    MalformedArguments { call_id: String, detail: String },
    #[error("duplicate tool call id {call_id} in the same turn")]
    DuplicateId { call_id: String },
}

#[derive(Debug, Default, Clone)]
struct Accumulator {
    id: Option<String>,
    name: Option<String>,
    args_buffer: String,
}

/// Accumulates [`ProviderChunk`] deltas into complete [`ToolCall`]s.
///
/// One assembler instance is scoped to a single turn's stream.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    slots: HashMap<usize, Accumulator>,
    /// Insertion order of slot indices, so `finish` returns calls in
    /// the order the provider introduced them.
    order: Vec<usize>,
}

/// Output produced while feeding a single chunk through the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblerEvent {
    /// Plain assistant text, pass straight through.
    TextDelta(String),
    /// A new tool-call slot was observed for the first time.
    ToolCallStarted { index: usize },
    /// No caller-visible effect (e.g. an argument fragment arrived).
    None,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw provider chunk. Returns what happened, if anything
    /// worth surfacing to the caller immediately.
    pub fn push(&mut self, chunk: &ProviderChunk) -> AssemblerEvent {
        match chunk {
            ProviderChunk::ContentDelta { text } => AssemblerEvent::TextDelta(text.clone()),
            ProviderChunk::ToolCallDelta { index, id, name, args_chunk } => {
                let is_new = !self.slots.contains_key(index);
                let slot = self.slots.entry(*index).or_default();
                if is_new {
                    self.order.push(*index);
                }
                if let Some(id) = id {
                    slot.id = Some(id.clone());
                }
                if let Some(name) = name {
                    slot.name = Some(name.clone());
                }
                if let Some(args) = args_chunk {
                    slot.args_buffer.push_str(args);
                }
                if is_new {
                    AssemblerEvent::ToolCallStarted { index: *index }
                } else {
                    AssemblerEvent::None
                }
            }
            ProviderChunk::Done { .. } => AssemblerEvent::None,
        }
    }

    /// Finalize the stream, turning accumulated slots into complete,
    /// validated tool calls. Returns every error found rather than
    /// stopping at the first, so a caller can report the full picture.
    pub fn finish(self) -> Result<Vec<ToolCall>, Vec<AssemblerError>> {
        let mut calls = Vec::new();
        let mut errors = Vec::new();
        let mut seen_ids: std::collections::HashSet<String> = std::collections::HashSet::new();

        for index in self.order {
            let slot = match self.slots.get(&index) {
                Some(s) => s,
                None => continue,
            };

            let (id, name) = match (&slot.id, &slot.name) {
                (Some(id), Some(name)) if !id.is_empty() && !name.is_empty() => {
                    (id.clone(), name.clone())
                }
                _ => {
                    errors.push(AssemblerError::MissingIdentity { index });
                    continue;
                }
            };

            if !seen_ids.insert(id.clone()) {
                errors.push(AssemblerError::DuplicateId { call_id: id });
                continue;
            }

            let trimmed = slot.args_buffer.trim();
            let arguments: serde_json::Value = if trimmed.is_empty() {
                serde_json::Value::Object(Default::default())
            } else {
                match serde_json::from_str(trimmed) {
                    Ok(v @ serde_json::Value::Object(_)) => v,
                    Ok(_) => {
                        errors.push(AssemblerError::MalformedArguments {
                            call_id: id,
                            detail: "arguments did not parse as a JSON object".into(),
                        });
                        continue;
                    }
                    Err(e) => {
                        errors.push(AssemblerError::MalformedArguments { call_id: id, detail: e.to_string() });
                        continue;
                    }
                }
            };

            calls.push(ToolCall { call_id: id, tool_name: name, arguments });
        }

        if errors.is_empty() {
            Ok(calls)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(index: usize, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> ProviderChunk {
        ProviderChunk::ToolCallDelta {
            index,
            id: id.map(String::from),
            name: name.map(String::from),
            args_chunk: args.map(String::from),
        }
    }

    #[test]
    fn assembles_single_call_from_fragmented_deltas() {
        let mut asm = ToolCallAssembler::new();
        asm.push(&delta(0, Some("c1"), Some("resolve_target"), Some("{\"target\":")));
        asm.push(&delta(0, None, None, Some("\"localhost\"}")));
        let calls = asm.finish().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_id, "c1");
        assert_eq!(calls[0].tool_name, "resolve_target");
        assert_eq!(calls[0].arguments, serde_json::json!({"target": "localhost"}));
    }

    #[test]
    fn assembles_two_concurrent_calls_preserving_order() {
        let mut asm = ToolCallAssembler::new();
        asm.push(&delta(0, Some("c1"), Some("a"), Some("{}")));
        asm.push(&delta(1, Some("c2"), Some("b"), Some("{}")));
        let calls = asm.finish().unwrap();
        assert_eq!(calls.iter().map(|c| c.call_id.as_str()).collect::<Vec<_>>(), vec!["c1", "c2"]);
    }

    #[test]
    fn empty_arguments_buffer_becomes_empty_object() {
        let mut asm = ToolCallAssembler::new();
        asm.push(&delta(0, Some("c1"), Some("ping"), None));
        let calls = asm.finish().unwrap();
        assert_eq!(calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn missing_name_is_protocol_error_not_silently_dropped() {
        let mut asm = ToolCallAssembler::new();
        asm.push(&delta(0, Some("c1"), None, Some("{}")));
        let err = asm.finish().unwrap_err();
        assert_eq!(err, vec![AssemblerError::MissingIdentity { index: 0 }]);
    }

    #[test]
    fn malformed_json_is_protocol_error_not_defaulted() {
        let mut asm = ToolCallAssembler::new();
        asm.push(&delta(0, Some("c1"), Some("resolve_target"), Some("{\"target\":")));
        let err = asm.finish().unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(matches!(&err[0], AssemblerError::MalformedArguments { call_id, .. } if call_id == "c1"));
    }

    #[test]
    fn non_object_arguments_is_protocol_error() {
        let mut asm = ToolCallAssembler::new();
        asm.push(&delta(0, Some("c1"), Some("resolve_target"), Some("[1,2,3]")));
        let err = asm.finish().unwrap_err();
        assert!(matches!(&err[0], AssemblerError::MalformedArguments { .. }));
    }

    #[test]
    fn duplicate_id_across_slots_is_protocol_error() {
        let mut asm = ToolCallAssembler::new();
        asm.push(&delta(0, Some("dup"), Some("a"), Some("{}")));
        asm.push(&delta(1, Some("dup"), Some("b"), Some("{}")));
        let err = asm.finish().unwrap_err();
        assert_eq!(err, vec![AssemblerError::DuplicateId { call_id: "dup".into() }]);
    }

    #[test]
    fn text_delta_passes_through() {
        let mut asm = ToolCallAssembler::new();
        let event = asm.push(&ProviderChunk::ContentDelta { text: "hi".into() });
        assert_eq!(event, AssemblerEvent::TextDelta("hi".into()));
    }

    #[test]
    fn no_tool_calls_yields_empty_vec() {
        let asm = ToolCallAssembler::new();
        assert_eq!(asm.finish().unwrap(), Vec::new());
    }
}
