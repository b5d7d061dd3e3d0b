use regex::Regex;
use serde_json::Value;

/// Masks substrings matching any of `patterns` with `"[REDACTED]"`.
///
/// Applied only to the copy written to the audit log or a
/// `policy_decision` event — the live value passed to `execute`
/// is never touched.
pub struct Redactor {
    patterns: Vec<Regex>,
}

impl Redactor {
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns.iter().map(|p| Regex::new(p)).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn redact_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.redact_str(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact_value(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), self.redact_value(v))).collect(),
            ),
            other => other.clone(),
        }
    }

    fn redact_str(&self, s: &str) -> String {
        let mut out = s.to_string();
        for re in &self.patterns {
            out = re.replace_all(&out, "[REDACTED]").into_owned();
        }
        out
    }
}
