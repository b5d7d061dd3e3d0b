use ao_domain::config::PolicyConfig;
use ao_domain::error::Result;
use ao_domain::event::PolicyVerdict;
use ao_domain::risk::RiskLevel;
use regex::Regex;

use crate::audit::{AuditRecord, AuditWriter};
use crate::decisions::{Decision, DecisionLog};
use crate::redact::Redactor;

/// The result of evaluating one tool call against policy.
#[derive(Debug, Clone)]
pub struct PolicyOutcome {
    pub verdict: PolicyVerdict,
    pub reason: String,
}

/// Gating rules evaluated in order:
/// 1. risk ceiling  2. blocked patterns  3. SHELL confirm  4. DESTRUCTIVE confirm  5. allow.
pub struct PolicyEngine {
    max_risk: RiskLevel,
    confirm_destructive: bool,
    confirm_shell: bool,
    blocked: Vec<Regex>,
    redactor: Redactor,
    audit: AuditWriter,
    decisions: DecisionLog,
}

impl PolicyEngine {
    pub fn new(config: &PolicyConfig, audit: AuditWriter) -> Result<Self> {
        let blocked = config
            .blocked_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ao_domain::error::Error::Config(format!("invalid blocked_patterns regex: {e}")))?;
        let redactor = Redactor::new(&config.redaction_patterns)
            .map_err(|e| ao_domain::error::Error::Config(format!("invalid redaction_patterns regex: {e}")))?;

        Ok(Self {
            max_risk: config.max_risk,
            confirm_destructive: config.confirm_destructive,
            confirm_shell: config.confirm_shell,
            blocked,
            redactor,
            audit,
            decisions: DecisionLog::new(config.decision_log_capacity),
        })
    }

    /// Evaluate one tool call and record the decision (audit log +
    /// in-memory ring buffer). The live `arguments` are never
    /// mutated or redacted here; redaction only affects what gets
    /// persisted.
    pub fn evaluate(
        &self,
        session_id: &str,
        call_id: &str,
        tool_name: &str,
        risk: RiskLevel,
        arguments: &serde_json::Value,
    ) -> PolicyOutcome {
        let outcome = self.decide(risk, arguments);

        let redacted = self.redactor.redact_value(arguments);
        if let Err(e) = self.audit.record(&AuditRecord {
            ts: chrono::Utc::now(),
            session_id: session_id.to_string(),
            call_id: call_id.to_string(),
            tool: tool_name.to_string(),
            risk,
            decision: outcome.verdict.to_string(),
            reason: outcome.reason.clone(),
            args_redacted: redacted,
        }) {
            tracing::warn!(error = %e, "failed to write audit record");
        }

        self.decisions.record(Decision {
            timestamp: chrono::Utc::now(),
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            risk,
            verdict: outcome.verdict,
            reason: outcome.reason.clone(),
        });

        ao_domain::trace::TraceEvent::PolicyDecision {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            decision: outcome.verdict.to_string(),
            reason: outcome.reason.clone(),
        }
        .emit();

        outcome
    }

    fn decide(&self, risk: RiskLevel, arguments: &serde_json::Value) -> PolicyOutcome {
        if risk > self.max_risk {
            return PolicyOutcome { verdict: PolicyVerdict::Deny, reason: "risk_ceiling".into() };
        }

        if let Some(pattern) = self.matching_blocked_pattern(arguments) {
            return PolicyOutcome { verdict: PolicyVerdict::Deny, reason: format!("blocked_pattern:{pattern}") };
        }

        if risk == RiskLevel::Shell && self.confirm_shell {
            return PolicyOutcome { verdict: PolicyVerdict::Confirm, reason: "shell_requires_confirmation".into() };
        }

        if risk == RiskLevel::Destructive && self.confirm_destructive {
            return PolicyOutcome {
                verdict: PolicyVerdict::Confirm,
                reason: "destructive_requires_confirmation".into(),
            };
        }

        PolicyOutcome { verdict: PolicyVerdict::Allow, reason: "allowed".into() }
    }

    fn matching_blocked_pattern(&self, value: &serde_json::Value) -> Option<String> {
        match value {
            serde_json::Value::String(s) => self.blocked.iter().find(|re| re.is_match(s)).map(|re| re.as_str().to_string()),
            serde_json::Value::Array(items) => items.iter().find_map(|v| self.matching_blocked_pattern(v)),
            serde_json::Value::Object(map) => map.values().find_map(|v| self.matching_blocked_pattern(v)),
            _ => None,
        }
    }

    pub fn recent_decisions(&self, limit: usize) -> Vec<Decision> {
        self.decisions.recent(limit)
    }

    /// Redact `arguments` the same way `evaluate` redacts them before
    /// writing to the audit log — for callers that need the same
    /// masked copy for a `policy_decision` event.
    pub fn redact_arguments(&self, arguments: &serde_json::Value) -> serde_json::Value {
        self.redactor.redact_value(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(max_risk: RiskLevel, blocked: Vec<String>) -> (PolicyEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditWriter::open(dir.path().join("audit.jsonl"), 10 * 1024 * 1024).unwrap();
        let config = PolicyConfig { max_risk, blocked_patterns: blocked, ..PolicyConfig::default() };
        (PolicyEngine::new(&config, audit).unwrap(), dir)
    }

    #[test]
    fn risk_above_ceiling_is_denied_before_shell_confirm() {
        let (engine, _dir) = engine(RiskLevel::ReadOnly, vec![]);
        let outcome = engine.evaluate("s1", "c1", "run_shell", RiskLevel::Shell, &serde_json::json!({}));
        assert_eq!(outcome.verdict, PolicyVerdict::Deny);
        assert_eq!(outcome.reason, "risk_ceiling");
    }

    #[test]
    fn blocked_pattern_denies_regardless_of_risk() {
        let (engine, _dir) = engine(RiskLevel::Shell, vec!["rm -rf".into()]);
        let outcome = engine.evaluate(
            "s1",
            "c1",
            "run_shell",
            RiskLevel::ReadOnly,
            &serde_json::json!({"command": "rm -rf /"}),
        );
        assert_eq!(outcome.verdict, PolicyVerdict::Deny);
        assert!(outcome.reason.starts_with("blocked_pattern"));
    }

    #[test]
    fn shell_risk_requires_confirmation_by_default() {
        let (engine, _dir) = engine(RiskLevel::Shell, vec![]);
        let outcome = engine.evaluate("s1", "c1", "run_shell", RiskLevel::Shell, &serde_json::json!({}));
        assert_eq!(outcome.verdict, PolicyVerdict::Confirm);
    }

    #[test]
    fn destructive_risk_requires_confirmation_by_default() {
        let (engine, _dir) = engine(RiskLevel::Destructive, vec![]);
        let outcome = engine.evaluate("s1", "c1", "delete_file", RiskLevel::Destructive, &serde_json::json!({}));
        assert_eq!(outcome.verdict, PolicyVerdict::Confirm);
    }

    #[test]
    fn read_only_is_allowed() {
        let (engine, _dir) = engine(RiskLevel::Shell, vec![]);
        let outcome = engine.evaluate("s1", "c1", "resolve_target", RiskLevel::ReadOnly, &serde_json::json!({}));
        assert_eq!(outcome.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn evaluate_records_decision_in_ring_buffer() {
        let (engine, _dir) = engine(RiskLevel::Shell, vec![]);
        engine.evaluate("s1", "c1", "resolve_target", RiskLevel::ReadOnly, &serde_json::json!({}));
        let recent = engine.recent_decisions(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].call_id, "c1");
    }

    #[test]
    fn evaluate_writes_redacted_copy_to_audit_log() {
        let (engine, dir) = engine(RiskLevel::Shell, vec![]);
        engine.evaluate(
            "s1",
            "c1",
            "resolve_target",
            RiskLevel::ReadOnly,
            &serde_json::json!({"key": "sk-deadbeef00112233"}),
        );
        let content = std::fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
        assert!(content.contains("[REDACTED]"));
        assert!(!content.contains("sk-deadbeef00112233"));
    }
}
