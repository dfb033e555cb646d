use serde::{Deserialize, Serialize};

/// The six probe kinds a check can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Http,
    Tcp,
    Ping,
    Dns,
    PageHash,
    TlsCert,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckKind::Http => write!(f, "http"),
            CheckKind::Tcp => write!(f, "tcp"),
            CheckKind::Ping => write!(f, "ping"),
            CheckKind::Dns => write!(f, "dns"),
            CheckKind::PageHash => write!(f, "page_hash"),
            CheckKind::TlsCert => write!(f, "tls_cert"),
        }
    }
}

impl std::str::FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(CheckKind::Http),
            "tcp" => Ok(CheckKind::Tcp),
            "ping" => Ok(CheckKind::Ping),
            "dns" => Ok(CheckKind::Dns),
            "page_hash" => Ok(CheckKind::PageHash),
            "tls_cert" => Ok(CheckKind::TlsCert),
            _ => Err(format!("unknown check kind: {s}")),
        }
    }
}

/// Outcome of a single probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Up,
    Down,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Up => write!(f, "up"),
            CheckStatus::Down => write!(f, "down"),
        }
    }
}

impl std::str::FromStr for CheckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(CheckStatus::Up),
            "down" => Ok(CheckStatus::Down),
            _ => Err(format!("unknown check status: {s}")),
        }
    }
}

/// Derived state of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

impl std::str::FromStr for HealthState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(HealthState::Healthy),
            "unhealthy" => Ok(HealthState::Unhealthy),
            _ => Err(format!("unknown health state: {s}")),
        }
    }
}

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOperator {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl std::fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleOperator::And => write!(f, "AND"),
            RuleOperator::Or => write!(f, "OR"),
        }
    }
}

impl std::str::FromStr for RuleOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(RuleOperator::And),
            "OR" => Ok(RuleOperator::Or),
            _ => Err(format!("unknown rule operator: {s}")),
        }
    }
}

/// Comparator applied by a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparator::Eq => write!(f, "eq"),
            Comparator::Neq => write!(f, "neq"),
            Comparator::Gt => write!(f, "gt"),
            Comparator::Lt => write!(f, "lt"),
            Comparator::Gte => write!(f, "gte"),
            Comparator::Lte => write!(f, "lte"),
        }
    }
}

impl std::str::FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Comparator::Eq),
            "neq" => Ok(Comparator::Neq),
            "gt" => Ok(Comparator::Gt),
            "lt" => Ok(Comparator::Lt),
            "gte" => Ok(Comparator::Gte),
            "lte" => Ok(Comparator::Lte),
            _ => Err(format!("unknown comparator: {s}")),
        }
    }
}

impl Comparator {
    /// Apply the comparator to string operands. Ordered comparators parse
    /// both sides as f64 and fail closed on non-numeric input.
    pub fn matches(&self, actual: &str, expected: &str) -> bool {
        match self {
            Comparator::Eq => actual == expected,
            Comparator::Neq => actual != expected,
            Comparator::Gt | Comparator::Lt | Comparator::Gte | Comparator::Lte => {
                let (Ok(a), Ok(e)) = (actual.parse::<f64>(), expected.parse::<f64>()) else {
                    return false;
                };
                match self {
                    Comparator::Gt => a > e,
                    Comparator::Lt => a < e,
                    Comparator::Gte => a >= e,
                    Comparator::Lte => a <= e,
                    _ => unreachable!(),
                }
            }
        }
    }
}

/// Kind of a recorded alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    Firing,
    Recovery,
    ReAlert,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Firing => write!(f, "firing"),
            AlertKind::Recovery => write!(f, "recovery"),
            AlertKind::ReAlert => write!(f, "re-alert"),
        }
    }
}

impl std::str::FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firing" => Ok(AlertKind::Firing),
            "recovery" => Ok(AlertKind::Recovery),
            "re-alert" => Ok(AlertKind::ReAlert),
            _ => Err(format!("unknown alert kind: {s}")),
        }
    }
}

/// Target categories used for dashboard grouping and SLA thresholds.
pub const CATEGORIES: &[&str] = &[
    "Network",
    "Security",
    "Physical Security",
    "Key Services",
    "Other",
];

/// Settings key holding the SLA threshold for a category.
pub fn sla_setting_key(category: &str) -> &'static str {
    match category {
        "Network" => "sla_network",
        "Security" => "sla_security",
        "Physical Security" => "sla_physical_security",
        "Key Services" => "sla_key_services",
        _ => "sla_other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn comparator_string_equality() {
        assert!(Comparator::Eq.matches("down", "down"));
        assert!(!Comparator::Eq.matches("up", "down"));
        assert!(Comparator::Neq.matches("up", "down"));
    }

    #[test]
    fn comparator_numeric_fails_closed() {
        assert!(Comparator::Gt.matches("1500", "1000"));
        assert!(!Comparator::Gt.matches("abc", "1000"));
        assert!(!Comparator::Lte.matches("5", "abc"));
        assert!(Comparator::Gte.matches("3.5", "3.5"));
    }

    #[test]
    fn enum_round_trips() {
        for s in ["http", "tcp", "ping", "dns", "page_hash", "tls_cert"] {
            assert_eq!(CheckKind::from_str(s).unwrap().to_string(), s);
        }
        assert_eq!(AlertKind::from_str("re-alert").unwrap(), AlertKind::ReAlert);
        assert_eq!(RuleOperator::from_str("OR").unwrap().to_string(), "OR");
    }
}
