use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider adapter identifier, e.g. "openai_compat".
    #[serde(default = "d_name")]
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_base: String,
    /// Name of the environment variable holding the API key, never the
    /// key itself.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_timeout")]
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            name: d_name(),
            model: String::new(),
            api_base: String::new(),
            api_key_env: d_api_key_env(),
            timeout_seconds: d_timeout(),
        }
    }
}

fn d_name() -> String {
    "openai_compat".into()
}
fn d_api_key_env() -> String {
    "AO_LLM_API_KEY".into()
}
fn d_timeout() -> u64 {
    60
}
