use std::path::{Path, PathBuf};

use anyhow::Context;
use ao_domain::config::{Config, ConfigOverride};

use crate::cli::Cli;

/// Resolve the config file path, load it if present, and layer
/// environment overrides on top — the `defaults < file < environment`
/// prefix of the precedence chain `Config::merge` implements. Caller
/// and per-session overrides are layered on afterward by whoever
/// starts a turn.
pub fn load_config(cli: &Cli) -> anyhow::Result<(Config, PathBuf)> {
    let path = config_path(cli);

    let file_config: Config = if path.exists() {
        let contents = std::fs::read_to_string(&path).with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config file {}", path.display()))?
    } else {
        Config::default()
    };

    let config = file_config.merge(env_override());
    Ok((config, path))
}

pub fn config_path(cli: &Cli) -> PathBuf {
    if let Some(path) = &cli.config {
        return path.clone();
    }
    if let Ok(path) = std::env::var("AO_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("ao").join("config.toml")
}

pub fn data_dir(cli: &Cli) -> PathBuf {
    if let Some(dir) = &cli.data_dir {
        return dir.clone();
    }
    if let Ok(dir) = std::env::var("AO_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("ao")
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
    env_var(name).and_then(|v| v.parse().ok())
}

fn env_list(name: &str) -> Option<Vec<String>> {
    env_var(name).map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
}

/// Build the environment-overrides layer: `AO_LLM_MODEL`,
/// `AO_POLICY_MAX_RISK`, etc. Unset or empty variables leave the
/// underlying field untouched.
fn env_override() -> ConfigOverride {
    ConfigOverride {
        llm_name: env_var("AO_LLM_NAME"),
        llm_model: env_var("AO_LLM_MODEL"),
        llm_api_base: env_var("AO_LLM_API_BASE"),
        llm_api_key_env: env_var("AO_LLM_API_KEY_ENV"),
        llm_timeout_seconds: env_var("AO_LLM_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()),
        policy_max_risk: env_var("AO_POLICY_MAX_RISK").and_then(|v| v.parse().ok()),
        policy_confirm_destructive: env_bool("AO_POLICY_CONFIRM_DESTRUCTIVE"),
        policy_confirm_shell: env_bool("AO_POLICY_CONFIRM_SHELL"),
        policy_blocked_patterns: env_list("AO_POLICY_BLOCKED_PATTERNS"),
        policy_redaction_patterns: env_list("AO_POLICY_REDACTION_PATTERNS"),
        session_token_budget: env_var("AO_SESSION_TOKEN_BUDGET").and_then(|v| v.parse().ok()),
        session_max_turns: env_var("AO_SESSION_MAX_TURNS").and_then(|v| v.parse().ok()),
        plugins_enabled: env_bool("AO_PLUGINS_ENABLED"),
        plugins_allowlist: env_list("AO_PLUGINS_ALLOWLIST"),
    }
}

pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}

pub fn validate(config: &Config, path: &Path) -> bool {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ao_domain::config::ConfigSeverity::Error => tracing::error!(path = %path.display(), "{issue}"),
            ao_domain::config::ConfigSeverity::Warning => tracing::warn!(path = %path.display(), "{issue}"),
        }
    }
    !issues.iter().any(|i| i.severity == ao_domain::config::ConfigSeverity::Error)
}
