mod llm;
mod plugins;
mod policy;
mod session;

pub use llm::*;
pub use plugins::*;
pub use policy::*;
pub use session::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.llm.api_base.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.api_base".into(),
                message: "api_base must not be empty".into(),
            });
        } else if !self.llm.api_base.starts_with("http://") && !self.llm.api_base.starts_with("https://") {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.api_base".into(),
                message: format!(
                    "api_base must start with http:// or https:// (got \"{}\")",
                    self.llm.api_base
                ),
            });
        }

        if self.llm.model.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.model".into(),
                message: "model must not be empty".into(),
            });
        }

        if self.llm.timeout_seconds == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.timeout_seconds".into(),
                message: "timeout_seconds must be greater than 0".into(),
            });
        }

        for (i, pattern) in self.policy.blocked_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("policy.blocked_patterns[{i}]"),
                    message: format!("invalid regex \"{pattern}\": {e}"),
                });
            }
        }
        for (i, pattern) in self.policy.redaction_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("policy.redaction_patterns[{i}]"),
                    message: format!("invalid regex \"{pattern}\": {e}"),
                });
            }
        }

        if self.session.token_budget == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "session.token_budget".into(),
                message: "token_budget must be greater than 0".into(),
            });
        }
        if self.session.max_turns == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "session.max_turns".into(),
                message: "max_turns must be greater than 0".into(),
            });
        }

        if self.plugins.enabled && self.plugins.allowlist.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "plugins.allowlist".into(),
                message: "plugins are enabled but allowlist is empty — no plugin tools will load".into(),
            });
        }

        errors
    }

    /// Merge a partial override on top of `self`, consuming both.
    ///
    /// Used to apply the precedence chain `defaults < file < env <
    /// caller < per-session`: each layer calls `merge` on the result
    /// of the previous one. `other`'s non-default scalar fields win;
    /// collection fields (patterns, allowlist) are replaced wholesale
    /// rather than concatenated, so a later layer can fully override
    /// an earlier one's list.
    pub fn merge(mut self, other: ConfigOverride) -> Self {
        if let Some(v) = other.llm_name {
            self.llm.name = v;
        }
        if let Some(v) = other.llm_model {
            self.llm.model = v;
        }
        if let Some(v) = other.llm_api_base {
            self.llm.api_base = v;
        }
        if let Some(v) = other.llm_api_key_env {
            self.llm.api_key_env = v;
        }
        if let Some(v) = other.llm_timeout_seconds {
            self.llm.timeout_seconds = v;
        }
        if let Some(v) = other.policy_max_risk {
            self.policy.max_risk = v;
        }
        if let Some(v) = other.policy_confirm_destructive {
            self.policy.confirm_destructive = v;
        }
        if let Some(v) = other.policy_confirm_shell {
            self.policy.confirm_shell = v;
        }
        if let Some(v) = other.policy_blocked_patterns {
            self.policy.blocked_patterns = v;
        }
        if let Some(v) = other.policy_redaction_patterns {
            self.policy.redaction_patterns = v;
        }
        if let Some(v) = other.session_token_budget {
            self.session.token_budget = v;
        }
        if let Some(v) = other.session_max_turns {
            self.session.max_turns = v;
        }
        if let Some(v) = other.plugins_enabled {
            self.plugins.enabled = v;
        }
        if let Some(v) = other.plugins_allowlist {
            self.plugins.allowlist = v;
        }
        self
    }
}

/// A sparse partial configuration, one layer in the precedence chain
/// `defaults < config file < environment overrides < caller overrides
/// < per-session overrides`. Each layer constructs a `ConfigOverride`
/// with only the fields it wants to set and folds it onto the running
/// `Config` via [`Config::merge`].
#[derive(Debug, Clone, Default)]
pub struct ConfigOverride {
    pub llm_name: Option<String>,
    pub llm_model: Option<String>,
    pub llm_api_base: Option<String>,
    pub llm_api_key_env: Option<String>,
    pub llm_timeout_seconds: Option<u64>,
    pub policy_max_risk: Option<crate::risk::RiskLevel>,
    pub policy_confirm_destructive: Option<bool>,
    pub policy_confirm_shell: Option<bool>,
    pub policy_blocked_patterns: Option<Vec<String>>,
    pub policy_redaction_patterns: Option<Vec<String>>,
    pub session_token_budget: Option<usize>,
    pub session_max_turns: Option<u32>,
    pub plugins_enabled: Option<bool>,
    pub plugins_allowlist: Option<Vec<String>>,
}
