/// Shared error taxonomy used across all agentops crates.
///
/// Errors inside a tool call are data fed back to the model (see
/// `ToolError`, `ValidationError`, `PolicyDenied`); errors in the
/// orchestrator machinery itself end the turn (`ProviderError`,
/// `ProtocolError`, `StoreError`).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("tool {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("store: {0}")]
    Store(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
