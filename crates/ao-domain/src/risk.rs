use serde::{Deserialize, Serialize};

/// Ordinal classification of a tool's potential impact.
///
/// Ordering matters: the policy engine compares a tool's risk against
/// the configured ceiling with plain `<`/`>`, relying on derive(Ord)
/// respecting declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    ReadOnly = 10,
    Write = 20,
    Destructive = 30,
    Shell = 40,
}

impl RiskLevel {
    pub fn as_ordinal(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::ReadOnly => "read_only",
            RiskLevel::Write => "write",
            RiskLevel::Destructive => "destructive",
            RiskLevel::Shell => "shell",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read_only" => Ok(RiskLevel::ReadOnly),
            "write" => Ok(RiskLevel::Write),
            "destructive" => Ok(RiskLevel::Destructive),
            "shell" => Ok(RiskLevel::Shell),
            other => Err(format!("unknown risk level \"{other}\" (expected one of read_only, write, destructive, shell)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_ascending_by_severity() {
        assert!(RiskLevel::ReadOnly < RiskLevel::Write);
        assert!(RiskLevel::Write < RiskLevel::Destructive);
        assert!(RiskLevel::Destructive < RiskLevel::Shell);
    }

    #[test]
    fn ordinals_match_spec() {
        assert_eq!(RiskLevel::ReadOnly.as_ordinal(), 10);
        assert_eq!(RiskLevel::Shell.as_ordinal(), 40);
    }

    #[test]
    fn from_str_round_trips_with_display() {
        for level in [RiskLevel::ReadOnly, RiskLevel::Write, RiskLevel::Destructive, RiskLevel::Shell] {
            let parsed: RiskLevel = level.to_string().parse().unwrap();
            assert_eq!(parsed, level);
        }
    }

    #[test]
    fn from_str_rejects_unknown_value() {
        assert!("very_dangerous".parse::<RiskLevel>().is_err());
    }
}
