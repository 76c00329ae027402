//! Priority-ordered service name inference for a host port.
//!
//! Evidence is consulted in this order, first success wins:
//! 1. the host's `Services` detail (`port,state,name` records),
//! 2. every other detail, where a `port/...` value outranks a bare `port`
//!    or `port::...` value,
//! 3. the static port mapper table,
//! 4. `"Unknown"`.

use crate::models::host::DetailMap;
use crate::services::port_mapper::PortMapper;

pub const UNKNOWN_SERVICE: &str = "Unknown";

/// Strength of a detail value's match against the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchTier {
    /// Bare numeric value or `port::...` value.
    Low,
    /// `port/...` value.
    High,
}

/// Resolves service names against host details and a static table.
#[derive(Debug, Clone, Copy)]
pub struct ServiceResolver<'a> {
    mapper: &'a PortMapper,
}

impl<'a> ServiceResolver<'a> {
    pub fn new(mapper: &'a PortMapper) -> Self {
        Self { mapper }
    }

    /// Resolve the service on `port`.
    ///
    /// `port_string` is the raw `"port/protocol"` field, used only for the
    /// static table lookup.
    pub fn resolve(&self, details: &DetailMap, port: &str, port_string: &str) -> String {
        if let Some(name) = from_services_detail(details.services(), port) {
            return name.to_string();
        }
        if let Some(name) = from_other_details(details, port) {
            return name.to_string();
        }
        if let Some(name) = self.mapper.lookup(port_string) {
            return name.to_string();
        }
        UNKNOWN_SERVICE.to_string()
    }
}

fn from_services_detail<'d>(values: &'d [String], port: &str) -> Option<&'d str> {
    values.iter().find_map(|value| {
        let mut fields = value.split(',').map(str::trim);
        if fields.next()? != port {
            return None;
        }
        fields.nth(1).filter(|name| !name.is_empty())
    })
}

/// Single pass over every non-`Services` detail, tagging each match.
///
/// The candidate is the detail's name. A `High` match ends the scan since
/// nothing can outrank it; a `Low` match is kept only if nothing was found
/// earlier, and scanning continues so a later `High` can replace it.
fn from_other_details<'d>(details: &'d DetailMap, port: &str) -> Option<&'d str> {
    let mut candidate: Option<&'d str> = None;
    for (name, values) in details.other() {
        if name.is_empty() {
            continue;
        }
        for value in values {
            match match_tier(value, port) {
                Some(MatchTier::High) => return Some(name),
                Some(MatchTier::Low) if candidate.is_none() => candidate = Some(name),
                _ => {}
            }
        }
    }
    candidate
}

fn match_tier(value: &str, port: &str) -> Option<MatchTier> {
    if let Some((head, _)) = value.split_once('/') {
        return (head == port).then_some(MatchTier::High);
    }
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        return (value == port).then_some(MatchTier::Low);
    }
    if let Some((head, _)) = value.split_once("::") {
        return (head == port).then_some(MatchTier::Low);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::host::HostRecord;

    fn details(pairs: &[(&str, &str)]) -> DetailMap {
        pairs
            .iter()
            .fold(HostRecord::builder("10.0.0.1"), |builder, (name, value)| {
                builder.detail(*name, *value)
            })
            .build()
            .details()
            .clone()
    }

    #[test]
    fn bare_port_detail_names_service() {
        let mapper = PortMapper::new();
        let resolver = ServiceResolver::new(&mapper);
        let details = details(&[("http", "80")]);
        assert_eq!(resolver.resolve(&details, "80", "80/tcp"), "http");
    }

    #[test]
    fn services_detail_takes_precedence() {
        let mapper = PortMapper::new();
        let resolver = ServiceResolver::new(&mapper);
        let details = details(&[("http", "80"), ("Services", "80,open,www")]);
        assert_eq!(resolver.resolve(&details, "80", "80/tcp"), "www");
    }

    #[test]
    fn services_detail_without_match_falls_through() {
        let mapper = PortMapper::new();
        let resolver = ServiceResolver::new(&mapper);
        let details = details(&[("Services", "443,open,https"), ("ssh", "22")]);
        assert_eq!(resolver.resolve(&details, "22", "22/tcp"), "ssh");
    }

    #[test]
    fn slash_match_overrides_earlier_low_match() {
        let mapper = PortMapper::new();
        let resolver = ServiceResolver::new(&mapper);
        let details = details(&[("tcp_ports", "8080"), ("http-alt", "8080/tcp")]);
        assert_eq!(resolver.resolve(&details, "8080", "8080/tcp"), "http-alt");
    }

    #[test]
    fn later_low_match_does_not_override() {
        let mapper = PortMapper::new();
        let resolver = ServiceResolver::new(&mapper);
        let details = details(&[("first", "8443::ssl"), ("second", "8443")]);
        assert_eq!(resolver.resolve(&details, "8443", "8443/tcp"), "first");
    }

    #[test]
    fn later_high_match_does_not_override_high() {
        let mapper = PortMapper::new();
        let resolver = ServiceResolver::new(&mapper);
        let details = details(&[("first", "25/tcp"), ("second", "25/tcp")]);
        assert_eq!(resolver.resolve(&details, "25", "25/tcp"), "first");
    }

    #[test]
    fn first_slash_match_beats_later_double_colon() {
        let mapper = PortMapper::new();
        let resolver = ServiceResolver::new(&mapper);
        let details = details(&[("weird", "21/ftp-data"), ("ftp", "21::banner")]);
        assert_eq!(resolver.resolve(&details, "21", "21/tcp"), "weird");
        assert_eq!(resolver.resolve(&details, "2", "2/tcp"), UNKNOWN_SERVICE);
    }

    #[test]
    fn falls_back_to_static_table_then_unknown() {
        let mapper = PortMapper::from_pairs([("3306/tcp", "mysql")]);
        let resolver = ServiceResolver::new(&mapper);
        let details = details(&[("http", "80")]);
        assert_eq!(resolver.resolve(&details, "3306", "3306/tcp"), "mysql");
        assert_eq!(resolver.resolve(&details, "9999", "9999/tcp"), UNKNOWN_SERVICE);
    }

    #[test]
    fn empty_details_use_static_table() {
        let mapper = PortMapper::from_pairs([("22/tcp", "ssh")]);
        let resolver = ServiceResolver::new(&mapper);
        assert_eq!(resolver.resolve(&DetailMap::default(), "22", "22/tcp"), "ssh");
    }
}
