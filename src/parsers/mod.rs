//! Scanner report parsers normalizing findings from various tools.
//!
//! Each parser implements the `Parser` trait, producing a host registry and
//! a list of `ReportItem` records from a tool-specific format (OpenVAS XML,
//! Nessus v2 XML, Webfuzzer text). A report that cannot be read at all
//! yields an empty result with a single `MalformedInput` error; it never
//! aborts the caller.

pub mod nessus;
pub mod openvas;
pub mod webfuzzer;

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::errors::AppError;
use crate::models::host::HostRegistry;
use crate::models::item::ReportItem;
use crate::models::severity::Severity;
use crate::services::port_mapper::PortMapper;

/// Result of parsing one report.
#[derive(Debug)]
pub struct ParseResult {
    pub hosts: HostRegistry,
    pub items: Vec<ReportItem>,
    pub errors: Vec<ParseError>,
    pub source_tool: String,
    /// Whether the format describes network interfaces for its hosts.
    pub models_interfaces: bool,
}

impl ParseResult {
    pub fn new(source_tool: &str, models_interfaces: bool) -> Self {
        Self {
            hosts: HostRegistry::new(),
            items: Vec::new(),
            errors: Vec::new(),
            source_tool: source_tool.to_string(),
            models_interfaces,
        }
    }

    /// Empty result for a report that could not be read.
    pub fn malformed(
        source_tool: &str,
        models_interfaces: bool,
        cause: impl std::fmt::Display,
    ) -> Self {
        let error = AppError::MalformedInput(cause.to_string());
        tracing::error!(source_tool, error = %error, "Report discarded");
        let mut result = Self::new(source_tool, models_interfaces);
        result.errors.push(ParseError {
            record_index: None,
            error,
        });
        result
    }

    /// Record a skipped item and keep going.
    pub fn skip(&mut self, record_index: usize, error: AppError) {
        tracing::warn!(
            source_tool = %self.source_tool,
            record_index,
            error = %error,
            "Skipping report item"
        );
        self.errors.push(ParseError {
            record_index: Some(record_index),
            error,
        });
    }

    pub fn is_malformed(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.record_index.is_none() && e.error.is_malformed_input())
    }
}

/// Error encountered while parsing a report or one of its items.
#[derive(Debug)]
pub struct ParseError {
    /// Item position in the report; `None` for report-level failures.
    pub record_index: Option<usize>,
    pub error: AppError,
}

/// Trait for pluggable scanner report parsers.
pub trait Parser: Send + Sync {
    /// Parse a raw report into hosts and items.
    fn parse(&self, data: &[u8]) -> ParseResult;

    /// The scanner tool name this parser handles.
    fn source_tool(&self) -> &str;

    /// Map tool-specific severity string to normalized severity.
    fn map_severity(&self, tool_severity: &str) -> Severity;
}

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserType {
    Openvas,
    Nessus,
    Webfuzzer,
}

impl ParserType {
    pub fn parser(self, mapper: Arc<PortMapper>) -> Box<dyn Parser> {
        match self {
            Self::Openvas => Box::new(openvas::OpenvasParser::new(mapper)),
            Self::Nessus => Box::new(nessus::NessusParser::new(mapper)),
            Self::Webfuzzer => Box::new(webfuzzer::WebfuzzerParser::new()),
        }
    }
}

impl std::fmt::Display for ParserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Openvas => write!(f, "openvas"),
            Self::Nessus => write!(f, "nessus"),
            Self::Webfuzzer => write!(f, "webfuzzer"),
        }
    }
}

impl FromStr for ParserType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openvas" => Ok(Self::Openvas),
            "nessus" => Ok(Self::Nessus),
            "webfuzzer" => Ok(Self::Webfuzzer),
            other => Err(AppError::Config(format!("unknown parser type: {other}"))),
        }
    }
}

/// Collapse runs of whitespace to single spaces and trim.
pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Return Some(s) if s is non-empty after trimming, None otherwise.
pub(crate) fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_type_round_trips_through_display() {
        for kind in [ParserType::Openvas, ParserType::Nessus, ParserType::Webfuzzer] {
            assert_eq!(kind.to_string().parse::<ParserType>().unwrap(), kind);
        }
        assert!("burp".parse::<ParserType>().is_err());
    }

    #[test]
    fn collapse_whitespace_normalizes_runs() {
        assert_eq!(collapse_whitespace("  a \n\t b  c "), "a b c");
        assert_eq!(collapse_whitespace("\n"), "");
    }

    #[test]
    fn malformed_result_is_empty() {
        let result = ParseResult::malformed("OpenVAS", false, "unexpected EOF");
        assert!(result.is_malformed());
        assert!(result.items.is_empty());
        assert!(result.hosts.is_empty());
    }

    #[test]
    fn parser_for_type_reports_tool_name() {
        let mapper = Arc::new(PortMapper::new());
        assert_eq!(ParserType::Openvas.parser(mapper.clone()).source_tool(), "OpenVAS");
        assert_eq!(ParserType::Nessus.parser(mapper.clone()).source_tool(), "Nessus");
        assert_eq!(ParserType::Webfuzzer.parser(mapper).source_tool(), "Webfuzzer");
    }
}
