//! Intermediate per-finding record handed from a parser to the builder.

use serde::Serialize;

use crate::models::severity::Severity;

/// Tokens recovered from a raw `"<port-or-name>/<protocol>"` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    /// Digits of the pre-slash text; `None` when it holds no digit at all.
    pub port: Option<String>,
    /// Post-slash text reduced to letters, `-` and `_`.
    pub protocol: String,
    /// Unfiltered pre-slash text, used as the service label of host-level items.
    pub label: String,
}

impl PortSpec {
    pub fn parse(raw: &str) -> Self {
        let (before, after) = raw.split_once('/').unwrap_or((raw, ""));
        let protocol: String = after
            .chars()
            .filter(|c| c.is_alphabetic() || matches!(c, '-' | '_'))
            .collect();
        let digits: String = before.chars().filter(char::is_ascii_digit).collect();
        Self {
            port: (!digits.is_empty()).then_some(digits),
            protocol,
            label: before.to_string(),
        }
    }
}

/// HTTP evidence captured by text-based web scanners.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebEvidence {
    pub path: String,
    pub method: String,
    pub response: String,
}

/// One finding extracted from a report, ready for the builder.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportItem {
    pub host: String,
    /// Owning host key; equals `host` when the report leaves it blank.
    pub subnet: String,
    pub raw_port: String,
    pub protocol: String,
    /// Numeric port; `None` makes this a host-level finding.
    pub port: Option<String>,
    pub service: String,
    pub severity: Option<Severity>,
    pub external_id: String,
    pub name: String,
    pub cves: Vec<String>,
    pub bids: Vec<String>,
    pub xref: String,
    pub tags: String,
    pub description: String,
    pub resolution: String,
    pub data: String,
    pub cvss_vector: String,
    pub references: Vec<String>,
    /// Website to attach web findings to.
    pub website: Option<String>,
    /// Present when the scanner itself reported the finding as a web request.
    pub web: Option<WebEvidence>,
}

impl ReportItem {
    pub fn severity_or_info(&self) -> Severity {
        self.severity.clone().unwrap_or(Severity::Info)
    }

    pub fn is_ignored(&self) -> bool {
        self.severity.as_ref().is_some_and(Severity::is_ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_port() {
        let spec = PortSpec::parse("80/tcp");
        assert_eq!(spec.port.as_deref(), Some("80"));
        assert_eq!(spec.protocol, "tcp");
    }

    #[test]
    fn named_port_is_host_level() {
        let spec = PortSpec::parse("general/tcp");
        assert_eq!(spec.port, None);
        assert_eq!(spec.protocol, "tcp");
        assert_eq!(spec.label, "general");
    }

    #[test]
    fn filters_noise_around_tokens() {
        let spec = PortSpec::parse("https (443)/tcp ");
        assert_eq!(spec.port.as_deref(), Some("443"));
        assert_eq!(spec.protocol, "tcp");

        let spec = PortSpec::parse("general/CPE-T");
        assert_eq!(spec.protocol, "CPE-T");
    }

    #[test]
    fn missing_slash_leaves_protocol_empty() {
        let spec = PortSpec::parse("8080");
        assert_eq!(spec.port.as_deref(), Some("8080"));
        assert_eq!(spec.protocol, "");
    }

    #[test]
    fn missing_severity_is_not_ignored() {
        let item = ReportItem::default();
        assert!(!item.is_ignored());
        assert_eq!(item.severity_or_info(), Severity::Info);
    }
}
