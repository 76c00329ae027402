//! Canonical severity labels shared by every report format.

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
    Log,
    Debug,
    /// A label the format emitted that has no canonical counterpart.
    Other(String),
}

impl Severity {
    /// Map a canonical label (case-insensitive) to a severity.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            "info" | "informational" => Self::Info,
            "log" => Self::Log,
            "debug" => Self::Debug,
            _ => Self::Other(label.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Info => "Info",
            Self::Log => "Log",
            Self::Debug => "Debug",
            Self::Other(label) => label,
        }
    }

    /// Findings with these severities never become vulnerabilities.
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Log | Self::Debug)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_labels_round_trip_case_insensitively() {
        assert_eq!(Severity::from_label("HIGH"), Severity::High);
        assert_eq!(Severity::from_label(" medium "), Severity::Medium);
        assert_eq!(Severity::from_label("Log").as_str(), "Log");
    }

    #[test]
    fn unknown_label_is_kept() {
        let severity = Severity::from_label("False Positive");
        assert_eq!(severity, Severity::Other("False Positive".to_string()));
        assert_eq!(severity.to_string(), "False Positive");
        assert!(!severity.is_ignored());
    }

    #[test]
    fn ignored_set() {
        assert!(Severity::Log.is_ignored());
        assert!(Severity::Debug.is_ignored());
        assert!(!Severity::Info.is_ignored());
        assert!(!Severity::Critical.is_ignored());
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_value(Severity::Critical).unwrap();
        assert_eq!(json, "Critical");
    }
}
