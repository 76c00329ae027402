//! OpenVAS XML report parser.
//!
//! Reads the asset section (`report/host` with its `detail` pairs) into a
//! host registry first, then walks every `result`, resolving the service
//! behind its port from the host's details. Handles both the exported
//! `<report>` document and the `<get_results_response>` API shape.

use std::sync::Arc;

use crate::errors::AppError;
use crate::models::host::{DetailMap, HostRecord, HostRegistry};
use crate::models::item::{PortSpec, ReportItem};
use crate::models::severity::Severity;
use crate::parsers::{collapse_whitespace, non_empty, ParseResult, Parser};
use crate::services::port_mapper::PortMapper;
use crate::services::service_resolver::ServiceResolver;
use crate::tree::{self, XmlNode};

/// Service label used when the report carries no asset section at all.
pub const NOT_SERVICE: &str = "Not Service";

const NO_CVE: &str = "NOCVE";
const NO_BID: &str = "NOBID";
const NO_XREF: &str = "NOXREF";

/// Parser for OpenVAS XML reports.
#[derive(Debug, Default)]
pub struct OpenvasParser {
    mapper: Arc<PortMapper>,
}

impl OpenvasParser {
    pub fn new(mapper: Arc<PortMapper>) -> Self {
        Self { mapper }
    }
}

impl Parser for OpenvasParser {
    fn parse(&self, data: &[u8]) -> ParseResult {
        let root = match tree::parse(data) {
            Ok(root) => root,
            Err(e) => return ParseResult::malformed(self.source_tool(), false, e),
        };

        let mut result = ParseResult::new(self.source_tool(), false);
        result.hosts = extract_hosts(&root);

        for (i, node) in result_nodes(&root).into_iter().enumerate() {
            match self.convert_result(node, &result.hosts, i) {
                Ok(item) => result.items.push(item),
                Err(err) => result.skip(i, err),
            }
        }

        tracing::debug!(
            hosts = result.hosts.len(),
            items = result.items.len(),
            skipped = result.errors.len(),
            "Parsed OpenVAS report"
        );
        result
    }

    fn source_tool(&self) -> &str {
        "OpenVAS"
    }

    fn map_severity(&self, tool_severity: &str) -> Severity {
        match tool_severity.trim() {
            "Alarm" => Severity::Critical,
            other => Severity::from_label(other),
        }
    }
}

/// Build the host registry from `report/host` nodes.
pub fn extract_hosts(root: &XmlNode) -> HostRegistry {
    root.find_all("report/host")
        .into_iter()
        .map(|host| {
            let address = collapse_whitespace(host.find("ip").map(XmlNode::text).unwrap_or(""));
            host.children_named("detail")
                .fold(HostRecord::builder(address), |builder, detail| {
                    let name = collapse_whitespace(detail.find("name").map(XmlNode::text).unwrap_or(""));
                    let value = collapse_whitespace(detail.find("value").map(XmlNode::text).unwrap_or(""));
                    builder.detail(name, value)
                })
                .build()
        })
        .collect()
}

/// Finding-bearing nodes: `report/results/result`, or top-level `result`.
fn result_nodes(root: &XmlNode) -> Vec<&XmlNode> {
    match root.find("report/results") {
        Some(results) => results.children_named("result").collect(),
        None => root.find_all("result"),
    }
}

impl OpenvasParser {
    /// Convert a single `result` node into a report item.
    fn convert_result(
        &self,
        node: &XmlNode,
        hosts: &HostRegistry,
        index: usize,
    ) -> Result<ReportItem, AppError> {
        let nvt = node
            .find("nvt")
            .ok_or_else(|| AppError::missing("nvt", format!("result #{index}")))?;

        let host = node.child_text("host");
        let subnet = non_empty(&node.child_text("subnet"))
            .map(String::from)
            .unwrap_or_else(|| host.clone());

        let raw_port = node.child_text("port");
        let port_spec = PortSpec::parse(&raw_port);
        let service = match &port_spec.port {
            None => port_spec.label.clone(),
            Some(_) if hosts.is_empty() => NOT_SERVICE.to_string(),
            Some(port) => self.resolve_service(hosts, &host, port, &raw_port),
        };

        let cves: Vec<String> = sentinel_filtered(nvt.child_text("cve"), NO_CVE)
            .map(|cve| split_list(&cve))
            .unwrap_or_default();
        let bids: Vec<String> = sentinel_filtered(nvt.child_text("bid"), NO_BID)
            .map(|bid| split_list(&bid).into_iter().map(|b| format!("BID-{b}")).collect())
            .unwrap_or_default();
        let xref = sentinel_filtered(nvt.child_text("xref"), NO_XREF).unwrap_or_default();

        let tags = nvt.child_text("tags");
        let mut data = match nvt.find("description") {
            Some(_) => nvt.child_text("description"),
            None => node.child_text("description"),
        };
        let mut description = String::new();
        let mut resolution = String::new();
        let mut cvss_vector = String::new();
        if !tags.is_empty() {
            let tag_data = TagData::parse(&tags);
            if !tag_data.impact.is_empty() {
                data.push_str(&format!("\n\nImpact: {}", tag_data.impact));
            }
            description = tag_data.description;
            resolution = tag_data.solution;
            cvss_vector = tag_data.cvss_base_vector;
        }

        let mut references = cves.clone();
        references.extend(bids.iter().cloned());
        if !xref.is_empty() {
            references.push(xref.clone());
        }
        if !tags.is_empty() && !cvss_vector.is_empty() {
            references.push(cvss_vector.clone());
        }

        Ok(ReportItem {
            website: Some(host.clone()),
            host,
            subnet,
            raw_port,
            protocol: port_spec.protocol,
            port: port_spec.port,
            service,
            severity: Some(self.map_severity(&node.child_text("threat"))),
            external_id: nvt.attr("oid").unwrap_or_default().to_string(),
            name: nvt.child_text("name"),
            cves,
            bids,
            xref,
            tags,
            description,
            resolution,
            data,
            cvss_vector,
            references,
            web: None,
        })
    }

    fn resolve_service(&self, hosts: &HostRegistry, host: &str, port: &str, raw_port: &str) -> String {
        let resolver = ServiceResolver::new(&self.mapper);
        match hosts.get(host) {
            Some(record) => resolver.resolve(record.details(), port, raw_port),
            None => {
                let err = AppError::UnresolvedHost(host.to_string());
                tracing::warn!(error = %err, port, "Resolving service without host details");
                resolver.resolve(&DetailMap::default(), port, raw_port)
            }
        }
    }
}

/// Fields recovered from a pipe-delimited `tags` string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagData {
    pub solution: String,
    pub cvss_base_vector: String,
    pub impact: String,
    /// `summary` and `insight` joined with a space.
    pub description: String,
}

impl TagData {
    /// Decompose `key=value|key=value` tags. Unknown keys are ignored.
    pub fn parse(tags: &str) -> Self {
        let mut data = Self::default();
        let mut summary = "";
        let mut insight = "";
        let clean = collapse_whitespace(tags);
        for segment in clean.split('|') {
            let Some((key, value)) = segment.split_once('=') else {
                continue;
            };
            match key {
                "solution" => data.solution = value.to_string(),
                "cvss_base_vector" => data.cvss_base_vector = value.to_string(),
                "impact" => data.impact = value.to_string(),
                "summary" => summary = value,
                "insight" => insight = value,
                _ => {}
            }
        }
        data.description = format!("{summary} {insight}").trim().to_string();
        data
    }
}

fn sentinel_filtered(value: String, sentinel: &str) -> Option<String> {
    (!value.is_empty() && value != sentinel).then_some(value)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}
