use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound for the packed context, in estimated tokens.
    #[serde(default = "d_token_budget")]
    pub token_budget: usize,
    /// Upper bound on orchestrator loop iterations per turn.
    #[serde(default = "d_max_turns")]
    pub max_turns: u32,
    /// Tokens reserved for the model's response when packing context.
    #[serde(default = "d_reserve")]
    pub reserve_for_response: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_budget: d_token_budget(),
            max_turns: d_max_turns(),
            reserve_for_response: d_reserve(),
        }
    }
}

fn d_token_budget() -> usize {
    32_000
}
fn d_max_turns() -> u32 {
    25
}
fn d_reserve() -> usize {
    2_000
}
