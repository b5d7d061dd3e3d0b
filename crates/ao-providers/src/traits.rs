use ao_domain::error::Result;
use ao_domain::message::{Message, ToolCall, ToolDefinition};
use ao_domain::stream::{BoxStream, ProviderChunk};

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
}

/// A provider-agnostic, non-streaming chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// Trait every LLM adapter implements.
///
/// Implementations translate between the orchestrator's internal types
/// and the wire format of one provider's streaming chat endpoint.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and return a stream of raw
    /// provider chunks, for the assembler to consume.
    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<ProviderChunk>>>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
