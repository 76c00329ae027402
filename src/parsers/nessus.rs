//! Nessus v2 (`.nessus`) XML report parser.
//!
//! Every `ReportHost` becomes a host record built from its `HostProperties`
//! tags, and every `ReportItem` under it becomes a finding. Nessus names
//! services itself (`svc_name`), so the resolver is only consulted when
//! that attribute is blank. Items on the `general` pseudo-service are
//! host-level.

use std::sync::Arc;

use crate::errors::AppError;
use crate::models::host::{HostRecord, HostRegistry, HOSTNAME_DETAIL};
use crate::models::item::ReportItem;
use crate::models::severity::Severity;
use crate::parsers::{non_empty, ParseResult, Parser};
use crate::services::port_mapper::PortMapper;
use crate::services::service_resolver::ServiceResolver;
use crate::tree::{self, XmlNode};

pub const HOST_IP_TAG: &str = "host-ip";
pub const HOST_FQDN_TAG: &str = "host-fqdn";
pub const MAC_ADDRESS_TAG: &str = "mac-address";
pub const OPERATING_SYSTEM_TAG: &str = "operating-system";

/// Pseudo-service Nessus uses for host-wide findings.
const GENERAL_SERVICE: &str = "general";

/// Port Nessus reports for findings not bound to a listening port.
const HOST_LEVEL_PORT: &str = "0";

/// Parser for Nessus v2 XML reports.
#[derive(Debug, Default)]
pub struct NessusParser {
    mapper: Arc<PortMapper>,
}

impl NessusParser {
    pub fn new(mapper: Arc<PortMapper>) -> Self {
        Self { mapper }
    }
}

impl Parser for NessusParser {
    fn parse(&self, data: &[u8]) -> ParseResult {
        let root = match tree::parse(data) {
            Ok(root) => root,
            Err(e) => return ParseResult::malformed(self.source_tool(), true, e),
        };

        let mut result = ParseResult::new(self.source_tool(), true);
        let mut hosts = HostRegistry::new();
        let mut record_index = 0usize;

        for report_host in root.find_all("Report/ReportHost") {
            let Some(record) = host_record(report_host) else {
                tracing::warn!(
                    name = report_host.attr("name").unwrap_or_default(),
                    "Skipping ReportHost without an address"
                );
                continue;
            };

            for node in report_host.children_named("ReportItem") {
                match self.convert_item(node, &record, record_index) {
                    Ok(item) => result.items.push(item),
                    Err(err) => result.skip(record_index, err),
                }
                record_index += 1;
            }
            hosts.insert(record);
        }

        result.hosts = hosts;
        tracing::debug!(
            hosts = result.hosts.len(),
            items = result.items.len(),
            skipped = result.errors.len(),
            "Parsed Nessus report"
        );
        result
    }

    fn source_tool(&self) -> &str {
        "Nessus"
    }

    fn map_severity(&self, tool_severity: &str) -> Severity {
        match tool_severity.trim() {
            "0" => Severity::Info,
            "1" => Severity::Low,
            "2" => Severity::Medium,
            "3" => Severity::High,
            "4" => Severity::Critical,
            "None" => Severity::Info,
            other => Severity::from_label(other),
        }
    }
}

/// Build a host record from `HostProperties`, keyed by `host-ip` or the
/// `ReportHost` name.
fn host_record(report_host: &XmlNode) -> Option<HostRecord> {
    let properties: Vec<(String, String)> = report_host
        .find_all("HostProperties/tag")
        .into_iter()
        .filter_map(|tag| {
            let name = tag.attr("name")?.trim().to_string();
            Some((name, tag.text().trim().to_string()))
        })
        .collect();

    let property = |key: &str| {
        report_host
            .find_where("HostProperties/tag", "name", key)
            .and_then(|tag| non_empty(tag.text()))
            .map(String::from)
    };

    let address = property(HOST_IP_TAG)
        .or_else(|| report_host.attr("name").and_then(non_empty).map(String::from))?;

    let mut builder = HostRecord::builder(address);
    if let Some(fqdn) = property(HOST_FQDN_TAG) {
        builder = builder.hostname(fqdn);
    }
    // Hostnames come from host-fqdn only
    for (name, value) in properties.into_iter().filter(|(name, _)| name != HOSTNAME_DETAIL) {
        builder = builder.detail(name, value);
    }
    Some(builder.build())
}

impl NessusParser {
    fn convert_item(
        &self,
        node: &XmlNode,
        host: &HostRecord,
        index: usize,
    ) -> Result<ReportItem, AppError> {
        let plugin_id = node
            .attr("pluginID")
            .and_then(non_empty)
            .ok_or_else(|| AppError::missing("pluginID", format!("ReportItem #{index}")))?
            .to_string();

        let svc_name = node.attr("svc_name").unwrap_or_default().trim().to_string();
        let protocol = node.attr("protocol").unwrap_or_default().trim().to_string();
        let raw_port = node.attr("port").unwrap_or_default().trim().to_string();

        let port = if svc_name == GENERAL_SERVICE || raw_port == HOST_LEVEL_PORT {
            None
        } else {
            non_empty(&raw_port).map(String::from)
        };
        let service = match &port {
            Some(port) if svc_name.is_empty() => ServiceResolver::new(&self.mapper).resolve(
                host.details(),
                port,
                &format!("{port}/{protocol}"),
            ),
            _ => svc_name,
        };

        let cves = node.child_texts("cve");
        let bids: Vec<String> = node
            .child_texts("bid")
            .into_iter()
            .map(|bid| format!("BID-{bid}"))
            .collect();
        let xrefs = node.child_texts("xref");
        let cvss_scores = node.child_texts("cvss_base_score");

        let mut references = cves.clone();
        references.extend(bids.iter().cloned());
        if !cvss_scores.is_empty() {
            references.push(format!("CVSS: {}", cvss_scores.join(", ")));
        }
        let xref = xrefs.join(", ");
        if !xref.is_empty() {
            references.push(xref.clone());
        }

        let data = non_empty(&node.child_text("plugin_output"))
            .map(|output| format!("\nOutput: {output}"))
            .unwrap_or_default();

        let address = host.address().to_string();
        Ok(ReportItem {
            host: address.clone(),
            subnet: address,
            raw_port,
            protocol,
            port,
            service,
            severity: Some(self.map_severity(node.attr("severity").unwrap_or_default())),
            external_id: plugin_id,
            name: node.attr("pluginName").unwrap_or_default().trim().to_string(),
            cves,
            bids,
            xref,
            tags: String::new(),
            description: node.child_text("description"),
            resolution: node.child_text("solution"),
            data,
            cvss_vector: node.child_text("cvss_vector"),
            references,
            website: Some(host.hostnames().first().cloned().unwrap_or_default()),
            web: None,
        })
    }
}
