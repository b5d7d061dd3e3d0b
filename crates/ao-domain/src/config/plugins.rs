use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginsConfig {
    /// Opt-in gate for loading externally-defined tools.
    #[serde(default)]
    pub enabled: bool,
    /// Plugin names permitted to load when `enabled` is true. Anything
    /// not on this list is skipped and logged.
    #[serde(default)]
    pub allowlist: Vec<String>,
}
