use serde::{Deserialize, Serialize};

use crate::risk::RiskLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Tools whose risk exceeds this ceiling are always denied.
    #[serde(default = "d_max_risk")]
    pub max_risk: RiskLevel,
    #[serde(default = "d_true")]
    pub confirm_destructive: bool,
    #[serde(default = "d_true")]
    pub confirm_shell: bool,
    /// Regex patterns; a match against any argument value denies the call.
    #[serde(default)]
    pub blocked_patterns: Vec<String>,
    /// Regex patterns applied to argument values before they are
    /// written to the audit log or a policy_decision event.
    #[serde(default = "d_redaction_patterns")]
    pub redaction_patterns: Vec<String>,
    /// Bytes after which the audit log is rotated.
    #[serde(default = "d_rotate_bytes")]
    pub audit_rotate_bytes: u64,
    /// Number of most-recent decisions kept in the in-memory ring buffer.
    #[serde(default = "d_decision_log_capacity")]
    pub decision_log_capacity: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_risk: d_max_risk(),
            confirm_destructive: true,
            confirm_shell: true,
            blocked_patterns: Vec::new(),
            redaction_patterns: d_redaction_patterns(),
            audit_rotate_bytes: d_rotate_bytes(),
            decision_log_capacity: d_decision_log_capacity(),
        }
    }
}

fn d_max_risk() -> RiskLevel {
    RiskLevel::Write
}
fn d_true() -> bool {
    true
}
fn d_redaction_patterns() -> Vec<String> {
    vec![
        r"sk-[A-Za-z0-9]{16,}".into(),
        r"(?i)bearer\s+[A-Za-z0-9._-]+".into(),
        r"-----BEGIN [A-Z ]+PRIVATE KEY-----[\s\S]+?-----END [A-Z ]+PRIVATE KEY-----".into(),
    ]
}
fn d_rotate_bytes() -> u64 {
    10 * 1024 * 1024
}
fn d_decision_log_capacity() -> usize {
    200
}
