use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ao_domain::error::Result;
use ao_domain::event::{EventPayload, PolicyVerdict, ToolResultStatus};
use ao_domain::message::ToolCall;
use ao_domain::stream::{PolicyDecisionChunk, ProviderChunk, StreamChunk};
use ao_policy::approval::ApprovalStore;
use ao_policy::PolicyEngine;
use ao_providers::{ChatRequest, LlmProvider};
use ao_store::SessionStore;
use ao_tools::{ToolOutcome, ToolRegistry};

use crate::confirm::{await_confirmation, ConfirmOutcome};

/// Everything about a turn that stays fixed for the lifetime of the
/// orchestrator: the system prompt, budgets, and per-request model
/// parameters. Per-call state (assembler slots, seen call ids) lives
/// only inside `run_turn`.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub system_prompt: String,
    pub token_budget: usize,
    pub reserve_for_response: usize,
    pub max_turns: u32,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub model: Option<String>,
    /// Tool output larger than this (serialized, in bytes) is moved
    /// into the artifact store and replaced with a reference rather
    /// than fed to the model or the live stream inline.
    pub artifact_inline_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            token_budget: 32_000,
            reserve_for_response: 2_000,
            max_turns: 25,
            temperature: None,
            max_tokens: None,
            model: None,
            artifact_inline_limit: 8192,
        }
    }
}

/// Runs the turn state machine: `Idle -> AwaitingModel ->
/// StreamingAssistant -> (DispatchingTools | Done)`, bounded by
/// `max_turns` loop iterations. Cheap to clone — every field is
/// either `Arc`-wrapped or itself a cheap handle.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<SessionStore>,
    provider: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    policy: Arc<PolicyEngine>,
    approvals: Arc<ApprovalStore>,
    artifacts: Option<Arc<ao_store::ArtifactStore>>,
    packer: Arc<ao_contextpack::ContextPacker>,
    config: Arc<OrchestratorConfig>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        provider: Arc<dyn LlmProvider>,
        tools: ToolRegistry,
        policy: Arc<PolicyEngine>,
        approvals: Arc<ApprovalStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            provider,
            tools,
            policy,
            approvals,
            artifacts: None,
            packer: Arc::new(ao_contextpack::ContextPacker::default()),
            config: Arc::new(config),
        }
    }

    /// Route tool output larger than `config.artifact_inline_limit`
    /// through a content-addressed artifact store instead of inlining
    /// it in the event log and the live stream.
    pub fn with_artifacts(mut self, artifacts: Arc<ao_store::ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Start a turn. Spawns the driving task and returns immediately;
    /// the receiver yields [`StreamChunk`]s until `turn_complete` or a
    /// fatal `error`.
    pub fn turn(&self, session_id: impl Into<String>, user_text: impl Into<String>, cancel: CancellationToken) -> mpsc::Receiver<StreamChunk> {
        let (tx, rx) = mpsc::channel(64);
        let this = self.clone();
        let session_id = session_id.into();
        let user_text = user_text.into();
        tokio::spawn(async move {
            this.run_turn(session_id, user_text, cancel, tx).await;
        });
        rx
    }

    async fn run_turn(&self, session_id: String, user_text: String, cancel: CancellationToken, tx: mpsc::Sender<StreamChunk>) {
        if let Err(e) = self.store.append(&session_id, EventPayload::UserPrompt { text: user_text }) {
            let _ = tx.send(StreamChunk::Error { message: format!("store_failure: {e}") }).await;
            return;
        }

        let mut seen_call_ids = match self.store.read_events(&session_id, None, None) {
            Ok(events) => gather_prior_call_ids(&events),
            Err(e) => {
                let _ = tx.send(StreamChunk::Error { message: format!("store_failure: {e}") }).await;
                return;
            }
        };

        let mut turn_index: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                self.record_error(&session_id, "cancelled", &tx).await;
                return;
            }

            let events = match self.store.read_events(&session_id, None, None) {
                Ok(events) => events,
                Err(e) => {
                    let _ = tx.send(StreamChunk::Error { message: format!("store_failure: {e}") }).await;
                    return;
                }
            };
            let (messages, _report) = self.packer.pack(&self.config.system_prompt, &events, self.config.token_budget, self.config.reserve_for_response);

            let req = ChatRequest {
                messages,
                tools: self.tools.list(),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
                model: self.config.model.clone(),
            };

            let mut stream = match self.provider.chat_stream(req).await {
                Ok(s) => s,
                Err(e) => {
                    self.record_error(&session_id, &format!("provider_failure: {e}"), &tx).await;
                    return;
                }
            };

            let mut assembler = ao_assembler::ToolCallAssembler::new();
            let mut text_buffer = String::new();
            let mut slot_ids: HashMap<usize, (Option<String>, Option<String>)> = HashMap::new();

            loop {
                let next = stream.next().await;
                let chunk = match next {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(e)) => {
                        self.record_error(&session_id, &format!("provider_failure: {e}"), &tx).await;
                        return;
                    }
                    None => break,
                };

                if let ProviderChunk::ToolCallDelta { index, id, name, args_chunk } = &chunk {
                    let slot = slot_ids.entry(*index).or_insert((None, None));
                    let was_known = slot.0.is_some() && slot.1.is_some();
                    if let Some(id) = id {
                        slot.0 = Some(id.clone());
                    }
                    if let Some(name) = name {
                        slot.1 = Some(name.clone());
                    }
                    let now_known = slot.0.is_some() && slot.1.is_some();
                    if now_known && !was_known {
                        let _ = tx
                            .send(StreamChunk::ToolCallStarted {
                                call_id: slot.0.clone().unwrap(),
                                tool_name: slot.1.clone().unwrap(),
                            })
                            .await;
                    }
                    if let (Some(args), Some(call_id)) = (args_chunk, &slot.0) {
                        let _ = tx.send(StreamChunk::ToolCallArgumentsDelta { call_id: call_id.clone(), delta: args.clone() }).await;
                    }
                }

                if let ao_assembler::AssemblerEvent::TextDelta(text) = assembler.push(&chunk) {
                    text_buffer.push_str(&text);
                    let _ = tx.send(StreamChunk::TextDelta { text }).await;
                }
            }

            let calls = match assembler.finish() {
                Ok(calls) => calls,
                Err(errors) => {
                    let message = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
                    self.record_error(&session_id, &format!("tool_call_assembly_failed: {message}"), &tx).await;
                    return;
                }
            };

            if !text_buffer.is_empty() {
                if let Err(e) = self.store.append(&session_id, EventPayload::AssistantText { text: text_buffer }) {
                    let _ = tx.send(StreamChunk::Error { message: format!("store_failure: {e}") }).await;
                    return;
                }
            }

            if calls.is_empty() {
                let _ = tx.send(StreamChunk::TurnComplete).await;
                return;
            }

            if let Err(e) = self.store.append(&session_id, EventPayload::AssistantToolCall { calls: calls.clone() }) {
                let _ = tx.send(StreamChunk::Error { message: format!("store_failure: {e}") }).await;
                return;
            }
            for call in &calls {
                let _ = tx.send(StreamChunk::ToolCallCompleted { call: call.clone() }).await;
            }

            let mut remaining_calls = calls.into_iter();
            while let Some(call) = remaining_calls.next() {
                if cancel.is_cancelled() {
                    // Every assistant_tool_call event this turn already appended must end
                    // up with a matching tool_result, even on abrupt cancellation.
                    self.record_tool_result(&session_id, &call.call_id, ToolResultStatus::Error, Value::Null, Some("aborted".into()), &tx).await;
                    for call in remaining_calls {
                        self.record_tool_result(&session_id, &call.call_id, ToolResultStatus::Error, Value::Null, Some("aborted".into()), &tx).await;
                    }
                    self.record_error(&session_id, "cancelled", &tx).await;
                    return;
                }
                self.dispatch_call(&session_id, call, &cancel, &tx, &mut seen_call_ids).await;
            }

            turn_index += 1;
            if turn_index >= self.config.max_turns {
                self.record_error(&session_id, "max_turns_exceeded", &tx).await;
                return;
            }
        }
    }

    async fn dispatch_call(
        &self,
        session_id: &str,
        call: ToolCall,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<StreamChunk>,
        seen_call_ids: &mut HashSet<String>,
    ) {
        let ToolCall { call_id, tool_name, arguments } = call;

        if !seen_call_ids.insert(call_id.clone()) {
            self.record_tool_result(session_id, &call_id, ToolResultStatus::Error, Value::Null, Some("duplicate_call_id".into()), tx).await;
            return;
        }

        let tool = match self.tools.get(&tool_name) {
            Some(tool) => tool,
            None => {
                self.record_tool_result(session_id, &call_id, ToolResultStatus::Error, Value::Null, Some("unknown_tool".into()), tx).await;
                return;
            }
        };

        if let Err(e) = ao_tools::schema::validate(tool.parameters_schema(), &arguments) {
            self.record_tool_result(
                session_id,
                &call_id,
                ToolResultStatus::Error,
                Value::Null,
                Some(format!("invalid_arguments: {e}")),
                tx,
            )
            .await;
            return;
        }

        let outcome = self.policy.evaluate(session_id, &call_id, &tool_name, tool.risk(), &arguments);

        let (effective_verdict, reason) = match outcome.verdict {
            PolicyVerdict::Deny => (PolicyVerdict::Deny, outcome.reason.clone()),
            PolicyVerdict::Allow => (PolicyVerdict::Allow, outcome.reason.clone()),
            PolicyVerdict::Confirm => match await_confirmation(&self.approvals, session_id, &call_id, &tool_name).await {
                ConfirmOutcome::Approved => (PolicyVerdict::Allow, "confirmed_by_operator".to_string()),
                ConfirmOutcome::Denied => (PolicyVerdict::Deny, "confirmation_denied".to_string()),
                ConfirmOutcome::TimedOut => (PolicyVerdict::Deny, "confirmation_timed_out".to_string()),
            },
        };

        let args_redacted = self.policy.redact_arguments(&arguments);
        let _ = self.store.append(
            session_id,
            EventPayload::PolicyDecision {
                call_id: call_id.clone(),
                tool_name: tool_name.clone(),
                risk: tool.risk(),
                decision: effective_verdict,
                reason: reason.clone(),
                args_redacted,
            },
        );
        let _ = tx
            .send(StreamChunk::PolicyDecision(PolicyDecisionChunk {
                call_id: call_id.clone(),
                tool_name: tool_name.clone(),
                decision: effective_verdict.to_string(),
                reason: reason.clone(),
            }))
            .await;

        if effective_verdict == PolicyVerdict::Deny {
            self.record_tool_result(session_id, &call_id, ToolResultStatus::Denied, Value::Null, Some(reason), tx).await;
            return;
        }

        match tool.execute(arguments, cancel.child_token()).await {
            Ok(ToolOutcome::Ok(value)) => self.record_tool_result(session_id, &call_id, ToolResultStatus::Ok, value, None, tx).await,
            Ok(ToolOutcome::Error(message)) => {
                self.record_tool_result(session_id, &call_id, ToolResultStatus::Error, Value::Null, Some(message), tx).await
            }
            Err(e) => self.record_tool_result(session_id, &call_id, ToolResultStatus::Error, Value::Null, Some(e.to_string()), tx).await,
        }
    }

    async fn record_tool_result(
        &self,
        session_id: &str,
        call_id: &str,
        status: ToolResultStatus,
        output: Value,
        error: Option<String>,
        tx: &mpsc::Sender<StreamChunk>,
    ) {
        let (output, artifact_refs) = self.offload_large_output(output);

        let _ = self.store.append(
            session_id,
            EventPayload::ToolResult {
                call_id: call_id.to_string(),
                status,
                output: output.clone(),
                artifact_refs,
                error: error.clone(),
            },
        );

        let status_str = match status {
            ToolResultStatus::Ok => "ok",
            ToolResultStatus::Error => "error",
            ToolResultStatus::Denied => "denied",
        };
        let output_for_chunk = match &error {
            Some(message) => serde_json::json!({ "error": message }),
            None => output,
        };
        let _ = tx
            .send(StreamChunk::ToolResult { call_id: call_id.to_string(), status: status_str.to_string(), output: output_for_chunk })
            .await;
    }

    /// If `output` serializes past `artifact_inline_limit` and an
    /// artifact store is configured, persist it there and return a
    /// small reference in its place. Otherwise pass it through
    /// unchanged.
    fn offload_large_output(&self, output: Value) -> (Value, Vec<String>) {
        let Some(artifacts) = &self.artifacts else {
            return (output, Vec::new());
        };
        let Ok(serialized) = serde_json::to_vec(&output) else {
            return (output, Vec::new());
        };
        if serialized.len() <= self.config.artifact_inline_limit {
            return (output, Vec::new());
        }
        match artifacts.put(&serialized) {
            Ok(hash) => (serde_json::json!({ "artifact_ref": hash, "bytes": serialized.len() }), vec![hash]),
            Err(e) => {
                tracing::warn!(error = %e, "failed to offload large tool output to artifact store");
                (output, Vec::new())
            }
        }
    }

    async fn record_error(&self, session_id: &str, message: &str, tx: &mpsc::Sender<StreamChunk>) {
        let _ = self.store.append(session_id, EventPayload::Error { message: message.to_string() });
        let _ = tx.send(StreamChunk::Error { message: message.to_string() }).await;
    }
}

fn gather_prior_call_ids(events: &[ao_domain::event::Event]) -> HashSet<String> {
    let mut seen = HashSet::new();
    for event in events {
        if let EventPayload::AssistantToolCall { calls } = &event.payload {
            for call in calls {
                seen.insert(call.call_id.clone());
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::OnceLock;

    use ao_domain::config::PolicyConfig;
    use ao_domain::risk::RiskLevel;
    use ao_domain::stream::BoxStream;
    use ao_policy::audit::AuditWriter;
    use ao_tools::{PrivacyScope, Tool, ToolRegistryBuilder};
    use async_trait::async_trait;
    use serde_json::json;

    struct FakeProvider {
        turns: StdMutex<VecDeque<Vec<ProviderChunk>>>,
    }

    impl FakeProvider {
        fn new(turns: Vec<Vec<ProviderChunk>>) -> Self {
            Self { turns: StdMutex::new(turns.into_iter().collect()) }
        }
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        async fn chat_stream(&self, _req: ChatRequest) -> Result<BoxStream<'static, Result<ProviderChunk>>> {
            let chunks = self.turns.lock().unwrap().pop_front().unwrap_or_default();
            Ok(Box::pin(futures_util::stream::iter(chunks.into_iter().map(Ok))))
        }
        fn provider_id(&self) -> &str {
            "fake"
        }
    }

    struct EchoTool {
        risk: RiskLevel,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its arguments"
        }
        fn risk(&self) -> RiskLevel {
            self.risk
        }
        fn privacy_scope(&self) -> PrivacyScope {
            PrivacyScope::Local
        }
        fn parameters_schema(&self) -> &Value {
            static SCHEMA: OnceLock<Value> = OnceLock::new();
            SCHEMA.get_or_init(|| json!({"type": "object", "properties": {}, "additionalProperties": false}))
        }
        async fn execute(&self, arguments: Value, _cancel: CancellationToken) -> Result<ToolOutcome> {
            Ok(ToolOutcome::Ok(arguments))
        }
    }

    fn make_policy(max_risk: RiskLevel, confirm_shell: bool) -> (Arc<PolicyEngine>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditWriter::open(dir.path().join("audit.jsonl"), 10 * 1024 * 1024).unwrap();
        let config = PolicyConfig { max_risk, confirm_shell, confirm_destructive: true, ..PolicyConfig::default() };
        (Arc::new(PolicyEngine::new(&config, audit).unwrap()), dir)
    }

    fn make_orchestrator(provider: FakeProvider, tools: ToolRegistry, max_risk: RiskLevel, confirm_shell: bool) -> (Orchestrator, tempfile::TempDir) {
        let store = Arc::new(SessionStore::open_in_memory().unwrap());
        let (policy, dir) = make_policy(max_risk, confirm_shell);
        let approvals = Arc::new(ApprovalStore::new(std::time::Duration::from_secs(5)));
        let config = OrchestratorConfig { system_prompt: "you are a test agent".into(), max_turns: 1, ..Default::default() };
        (Orchestrator::new(store, Arc::new(provider), tools, policy, approvals, config), dir)
    }

    fn tool_call_delta(index: usize, id: &str, name: &str, args: &str) -> ProviderChunk {
        ProviderChunk::ToolCallDelta { index, id: Some(id.into()), name: Some(name.into()), args_chunk: Some(args.into()) }
    }

    #[tokio::test]
    async fn plain_text_turn_completes_without_tool_calls() {
        let provider = FakeProvider::new(vec![vec![
            ProviderChunk::ContentDelta { text: "hello".into() },
            ProviderChunk::ContentDelta { text: " there".into() },
            ProviderChunk::Done { finish_reason: Some("stop".into()), usage: None },
        ]]);
        let tools = ToolRegistryBuilder::new().build();
        let (orch, _dir) = make_orchestrator(provider, tools, RiskLevel::Shell, true);

        let session_id = orch.store.start_session().unwrap();
        let mut rx = orch.turn(session_id.clone(), "hi", CancellationToken::new());

        let mut saw_text = String::new();
        let mut completed = false;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::TextDelta { text } => saw_text.push_str(&text),
                StreamChunk::TurnComplete => {
                    completed = true;
                    break;
                }
                StreamChunk::Error { message } => panic!("unexpected error: {message}"),
                _ => {}
            }
        }
        assert!(completed);
        assert_eq!(saw_text, "hello there");

        let events = orch.store.read_events(&session_id, None, None).unwrap();
        assert!(events.iter().any(|e| matches!(&e.payload, EventPayload::AssistantText { text } if text == "hello there")));
    }

    #[tokio::test]
    async fn unknown_tool_call_reports_error_result() {
        let provider = FakeProvider::new(vec![vec![
            tool_call_delta(0, "c1", "does_not_exist", "{}"),
            ProviderChunk::Done { finish_reason: Some("tool_calls".into()), usage: None },
        ]]);
        let tools = ToolRegistryBuilder::new().build();
        let (orch, _dir) = make_orchestrator(provider, tools, RiskLevel::Shell, true);

        let session_id = orch.store.start_session().unwrap();
        let mut rx = orch.turn(session_id, "call a tool", CancellationToken::new());

        let mut got_unknown_tool_error = false;
        let mut got_max_turns_error = false;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::ToolResult { status, output, .. } if status == "error" => {
                    assert_eq!(output["error"], json!("unknown_tool"));
                    got_unknown_tool_error = true;
                }
                StreamChunk::Error { message } if message == "max_turns_exceeded" => {
                    got_max_turns_error = true;
                }
                _ => {}
            }
        }
        assert!(got_unknown_tool_error);
        assert!(got_max_turns_error);
    }

    #[tokio::test]
    async fn duplicate_call_id_across_session_is_rejected() {
        let provider = FakeProvider::new(vec![vec![
            tool_call_delta(0, "dup-1", "echo", "{}"),
            ProviderChunk::Done { finish_reason: Some("tool_calls".into()), usage: None },
        ]]);
        let tools = ToolRegistryBuilder::new().register(Arc::new(EchoTool { risk: RiskLevel::ReadOnly })).build();
        let (orch, _dir) = make_orchestrator(provider, tools, RiskLevel::Shell, true);

        let session_id = orch.store.start_session().unwrap();
        orch.store
            .append(
                &session_id,
                EventPayload::AssistantToolCall {
                    calls: vec![ToolCall { call_id: "dup-1".into(), tool_name: "echo".into(), arguments: json!({}) }],
                },
            )
            .unwrap();

        let mut rx = orch.turn(session_id, "go", CancellationToken::new());
        let mut got_duplicate = false;
        while let Some(chunk) = rx.recv().await {
            if let StreamChunk::ToolResult { status, output, .. } = chunk {
                if status == "error" {
                    assert_eq!(output["error"], json!("duplicate_call_id"));
                    got_duplicate = true;
                }
            }
        }
        assert!(got_duplicate);
    }

    #[tokio::test]
    async fn risk_above_ceiling_is_denied_without_executing() {
        let provider = FakeProvider::new(vec![vec![
            tool_call_delta(0, "c1", "echo", "{}"),
            ProviderChunk::Done { finish_reason: Some("tool_calls".into()), usage: None },
        ]]);
        let tools = ToolRegistryBuilder::new().register(Arc::new(EchoTool { risk: RiskLevel::Shell })).build();
        let (orch, _dir) = make_orchestrator(provider, tools, RiskLevel::ReadOnly, true);

        let session_id = orch.store.start_session().unwrap();
        let mut rx = orch.turn(session_id, "go", CancellationToken::new());

        let mut got_denied = false;
        let mut got_policy_deny = false;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::PolicyDecision(d) if d.decision == "deny" => got_policy_deny = true,
                StreamChunk::ToolResult { status, .. } if status == "denied" => got_denied = true,
                _ => {}
            }
        }
        assert!(got_policy_deny);
        assert!(got_denied);
    }

    #[tokio::test]
    async fn malformed_stream_terminates_turn_without_tool_result() {
        let provider = FakeProvider::new(vec![vec![
            ProviderChunk::ToolCallDelta { index: 0, id: Some("c1".into()), name: Some("resolve_target".into()), args_chunk: Some("{\"target\":".into()) },
            ProviderChunk::Done { finish_reason: Some("tool_calls".into()), usage: None },
        ]]);
        let tools = ToolRegistryBuilder::new().build();
        let (orch, _dir) = make_orchestrator(provider, tools, RiskLevel::Shell, true);

        let session_id = orch.store.start_session().unwrap();
        let mut rx = orch.turn(session_id.clone(), "go", CancellationToken::new());

        let mut got_protocol_error = false;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::Error { message } => {
                    assert!(message.contains("tool_call_assembly_failed"));
                    got_protocol_error = true;
                }
                StreamChunk::ToolResult { .. } => panic!("no tool_result should be appended on a malformed stream"),
                _ => {}
            }
        }
        assert!(got_protocol_error);

        let events = orch.store.read_events(&session_id, None, None).unwrap();
        assert!(!events.iter().any(|e| matches!(&e.payload, EventPayload::ToolResult { .. })));
        assert!(matches!(&events.last().unwrap().payload, EventPayload::Error { .. }));
    }

    /// Cancels the shared token the first time it runs, then records
    /// whether it was ever invoked a second time.
    struct CancelOnFirstRunTool {
        cancel: CancellationToken,
        run_count: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Tool for CancelOnFirstRunTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "cancels the turn's token on its first invocation"
        }
        fn risk(&self) -> RiskLevel {
            RiskLevel::ReadOnly
        }
        fn privacy_scope(&self) -> PrivacyScope {
            PrivacyScope::Local
        }
        fn parameters_schema(&self) -> &Value {
            static SCHEMA: OnceLock<Value> = OnceLock::new();
            SCHEMA.get_or_init(|| json!({"type": "object", "properties": {}, "additionalProperties": false}))
        }
        async fn execute(&self, arguments: Value, _cancel: CancellationToken) -> Result<ToolOutcome> {
            self.run_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.cancel.cancel();
            Ok(ToolOutcome::Ok(arguments))
        }
    }

    #[tokio::test]
    async fn cancellation_mid_dispatch_aborts_remaining_calls_and_leaves_log_consistent() {
        let provider = FakeProvider::new(vec![vec![
            tool_call_delta(0, "c1", "echo", "{}"),
            tool_call_delta(1, "c2", "echo", "{}"),
            ProviderChunk::Done { finish_reason: Some("tool_calls".into()), usage: None },
        ]]);
        let cancel = CancellationToken::new();
        let tool = Arc::new(CancelOnFirstRunTool { cancel: cancel.clone(), run_count: std::sync::atomic::AtomicUsize::new(0) });
        let tools = ToolRegistryBuilder::new().register(tool.clone()).build();
        let (orch, _dir) = make_orchestrator(provider, tools, RiskLevel::Shell, true);

        let session_id = orch.store.start_session().unwrap();
        let mut rx = orch.turn(session_id.clone(), "go", cancel);

        let mut saw_cancelled_error = false;
        let mut saw_ok_result = false;
        let mut saw_aborted_result = false;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::Error { message } => {
                    assert_eq!(message, "cancelled");
                    saw_cancelled_error = true;
                }
                StreamChunk::ToolResult { status, output, .. } if status == "ok" => {
                    let _ = output;
                    saw_ok_result = true;
                }
                StreamChunk::ToolResult { status, output, .. } if status == "error" => {
                    assert_eq!(output["error"], json!("aborted"));
                    saw_aborted_result = true;
                }
                _ => {}
            }
        }
        assert!(saw_cancelled_error);
        assert!(saw_ok_result, "the first call should have executed before cancellation was observed");
        assert!(saw_aborted_result, "the second call should be recorded as aborted, not executed");
        assert_eq!(tool.run_count.load(std::sync::atomic::Ordering::SeqCst), 1);

        let events = orch.store.read_events(&session_id, None, None).unwrap();
        match &events.last().unwrap().payload {
            EventPayload::Error { message } => assert_eq!(message, "cancelled"),
            other => panic!("expected the log to end in error(cancelled), got {other:?}"),
        }
        assert!(events.iter().any(
            |e| matches!(&e.payload, EventPayload::ToolResult { call_id, status: ToolResultStatus::Error, error, .. } if call_id == "c2" && error.as_deref() == Some("aborted"))
        ));
    }

    struct BigOutputTool;

    #[async_trait]
    impl Tool for BigOutputTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "returns an output larger than the inline limit"
        }
        fn risk(&self) -> RiskLevel {
            RiskLevel::ReadOnly
        }
        fn privacy_scope(&self) -> PrivacyScope {
            PrivacyScope::Local
        }
        fn parameters_schema(&self) -> &Value {
            static SCHEMA: OnceLock<Value> = OnceLock::new();
            SCHEMA.get_or_init(|| json!({"type": "object", "properties": {}, "additionalProperties": false}))
        }
        async fn execute(&self, _arguments: Value, _cancel: CancellationToken) -> Result<ToolOutcome> {
            Ok(ToolOutcome::Ok(json!({ "blob": "x".repeat(9000) })))
        }
    }

    #[tokio::test]
    async fn large_tool_output_is_offloaded_to_artifact_store() {
        let provider = FakeProvider::new(vec![vec![
            tool_call_delta(0, "c1", "echo", "{}"),
            ProviderChunk::Done { finish_reason: Some("tool_calls".into()), usage: None },
        ]]);
        let tools = ToolRegistryBuilder::new().register(Arc::new(BigOutputTool)).build();
        let (orch, _policy_dir) = make_orchestrator(provider, tools, RiskLevel::Shell, true);
        let artifacts_dir = tempfile::tempdir().unwrap();
        let orch = orch.with_artifacts(Arc::new(ao_store::ArtifactStore::open(artifacts_dir.path()).unwrap()));

        let session_id = orch.store.start_session().unwrap();
        let mut rx = orch.turn(session_id.clone(), "go", CancellationToken::new());

        let mut saw_artifact_ref = false;
        while let Some(chunk) = rx.recv().await {
            if let StreamChunk::ToolResult { status, output, .. } = chunk {
                if status == "ok" {
                    assert!(output.get("artifact_ref").is_some());
                    assert!(output["bytes"].as_u64().unwrap() > 8192);
                    saw_artifact_ref = true;
                }
            }
        }
        assert!(saw_artifact_ref);

        let events = orch.store.read_events(&session_id, None, None).unwrap();
        let stored = events
            .iter()
            .find_map(|e| match &e.payload {
                EventPayload::ToolResult { artifact_refs, .. } if !artifact_refs.is_empty() => Some(artifact_refs.clone()),
                _ => None,
            })
            .expect("expected a tool_result with a non-empty artifact_refs");
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn shell_risk_confirmed_by_operator_then_executes() {
        let provider = FakeProvider::new(vec![vec![
            tool_call_delta(0, "c1", "echo", "{}"),
            ProviderChunk::Done { finish_reason: Some("tool_calls".into()), usage: None },
        ]]);
        let tools = ToolRegistryBuilder::new().register(Arc::new(EchoTool { risk: RiskLevel::Shell })).build();
        let (orch, _dir) = make_orchestrator(provider, tools, RiskLevel::Shell, true);

        let session_id = orch.store.start_session().unwrap();
        let approvals = orch.approvals.clone();
        let mut rx = orch.turn(session_id, "go", CancellationToken::new());

        let approver = tokio::spawn(async move {
            loop {
                let pending = approvals.list_pending();
                if let Some(info) = pending.first() {
                    approvals.approve(&info.id);
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        });

        let mut got_allow = false;
        let mut got_ok_result = false;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::PolicyDecision(d) if d.decision == "allow" => got_allow = true,
                StreamChunk::ToolResult { status, .. } if status == "ok" => got_ok_result = true,
                _ => {}
            }
        }
        approver.await.unwrap();
        assert!(got_allow);
        assert!(got_ok_result);
    }
}
