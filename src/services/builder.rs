//! Canonical model builder: turns a parsed report into sink calls.
//!
//! Owns the per-run identity index so that a subnet is created as a host
//! at most once and a (subnet, port) pair as a service at most once. One
//! builder serves one report; concurrent reports need their own builders.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::entity::{NewHost, NewInterface, NewNote, NewService, NewWebVuln, VulnDetails};
use crate::models::host::{HostRecord, HostRegistry};
use crate::models::item::ReportItem;
use crate::parsers::nessus::{MAC_ADDRESS_TAG, OPERATING_SYSTEM_TAG};
use crate::parsers::ParseResult;
use crate::services::sink::Sink;

/// Ports treated as web when the report gives no service name.
const WEB_PORTS: [&str; 3] = ["80", "443", "8080"];

/// Service name prefixes that mark a web service (case-insensitive).
const WEB_PREFIXES: [&str; 2] = ["www", "http"];

/// Note attached once to every web service.
const WEBSITE_NOTE: &str = "website";

/// Identity of a service within one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub subnet: String,
    pub port: String,
}

/// Counts of what one run emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildSummary {
    pub hosts: usize,
    pub interfaces: usize,
    pub services: usize,
    pub vulnerabilities: usize,
    pub notes: usize,
    /// Items whose severity kept them from becoming vulnerabilities.
    pub ignored: usize,
}

/// Emits canonical entities for one report.
pub struct ReportBuilder<'s, S: Sink> {
    sink: &'s mut S,
    models_interfaces: bool,
    hosts: HashMap<String, Uuid>,
    interfaces: HashMap<String, Uuid>,
    services: HashMap<ServiceKey, Uuid>,
    annotated: HashSet<Uuid>,
    summary: BuildSummary,
}

impl<'s, S: Sink> ReportBuilder<'s, S> {
    pub fn new(sink: &'s mut S, models_interfaces: bool) -> Self {
        Self {
            sink,
            models_interfaces,
            hosts: HashMap::new(),
            interfaces: HashMap::new(),
            services: HashMap::new(),
            annotated: HashSet::new(),
            summary: BuildSummary::default(),
        }
    }

    /// Emit a whole parsed report: registry hosts first, then every item.
    pub fn build(mut self, report: ParseResult) -> Result<BuildSummary, AppError> {
        self.models_interfaces = report.models_interfaces;
        self.add_hosts(&report.hosts)?;
        for item in report.items {
            self.add_item(item)?;
        }
        tracing::info!(
            source_tool = %report.source_tool,
            hosts = self.summary.hosts,
            services = self.summary.services,
            vulnerabilities = self.summary.vulnerabilities,
            ignored = self.summary.ignored,
            "Report normalized"
        );
        Ok(self.summary)
    }

    pub fn add_hosts(&mut self, registry: &HostRegistry) -> Result<(), AppError> {
        for record in registry.iter() {
            self.create_host(record)?;
        }
        Ok(())
    }

    /// Emit one item, creating its host and service on first sight.
    pub fn add_item(&mut self, item: ReportItem) -> Result<(), AppError> {
        let host_id = self.host_for(&item)?;

        let Some(port) = item.port.clone() else {
            if item.is_ignored() {
                self.summary.ignored += 1;
                return Ok(());
            }
            self.sink.create_vuln_host(host_id, vuln_details(&item))?;
            self.summary.vulnerabilities += 1;
            return Ok(());
        };

        let service_id = self.service_for(host_id, &item, &port)?;
        let web = is_web(&item, &port);
        let website = item.website.clone().unwrap_or_else(|| item.host.clone());

        if web && self.annotated.insert(service_id) {
            let note_id = self.sink.create_note(
                host_id,
                service_id,
                NewNote {
                    name: WEBSITE_NOTE.to_string(),
                    text: String::new(),
                },
            )?;
            self.sink.create_note_on_note(
                host_id,
                service_id,
                note_id,
                NewNote {
                    name: website.clone(),
                    text: String::new(),
                },
            )?;
            self.summary.notes += 2;
        }

        if item.is_ignored() {
            self.summary.ignored += 1;
            return Ok(());
        }

        if web {
            let evidence = item.web.clone();
            let vuln = NewWebVuln {
                details: vuln_details(&item),
                website,
                path: evidence.as_ref().map(|e| e.path.clone()),
                method: evidence.as_ref().map(|e| e.method.clone()),
                response: evidence.map(|e| e.response),
            };
            self.sink.create_vuln_web_service(host_id, service_id, vuln)?;
        } else {
            self.sink
                .create_vuln_service(host_id, service_id, vuln_details(&item))?;
        }
        self.summary.vulnerabilities += 1;
        Ok(())
    }

    fn create_host(&mut self, record: &HostRecord) -> Result<Uuid, AppError> {
        let details = record.details();
        let host_id = self.sink.create_host(NewHost {
            ip: record.address().to_string(),
            hostnames: record.hostnames().to_vec(),
            os: details.first(OPERATING_SYSTEM_TAG).map(String::from),
        })?;
        self.hosts.insert(record.address().to_string(), host_id);
        self.summary.hosts += 1;
        tracing::debug!(ip = record.address(), %host_id, "Created host");

        if self.models_interfaces {
            let interface_id = self.sink.create_interface(NewInterface::for_address(
                host_id,
                record.address(),
                details.first(MAC_ADDRESS_TAG).map(String::from),
                record.hostnames().to_vec(),
            ))?;
            self.interfaces
                .insert(record.address().to_string(), interface_id);
            self.summary.interfaces += 1;
        }
        Ok(host_id)
    }

    /// Host owning the item's subnet, synthesized when the asset section
    /// never mentioned it.
    fn host_for(&mut self, item: &ReportItem) -> Result<Uuid, AppError> {
        if let Some(&host_id) = self.hosts.get(&item.subnet) {
            return Ok(host_id);
        }
        let mut record = HostRecord::builder(item.subnet.clone());
        if !item.host.is_empty() {
            record = record.hostname(item.host.clone());
        }
        self.create_host(&record.build())
    }

    fn service_for(
        &mut self,
        host_id: Uuid,
        item: &ReportItem,
        port: &str,
    ) -> Result<Uuid, AppError> {
        let key = ServiceKey {
            subnet: item.subnet.clone(),
            port: port.to_string(),
        };
        if let Some(&service_id) = self.services.get(&key) {
            return Ok(service_id);
        }

        let interface_id = self.interfaces.get(&item.subnet).copied();
        let service_id = self.sink.create_service(NewService {
            host_id,
            interface_id,
            name: item.service.clone(),
            protocol: item.protocol.clone(),
            ports: vec![port.to_string()],
            status: interface_id.map(|_| "open".to_string()),
        })?;
        tracing::debug!(subnet = %key.subnet, port = %key.port, %service_id, "Created service");
        self.services.insert(key, service_id);
        self.summary.services += 1;
        Ok(service_id)
    }
}

/// Web classification: scanner-reported web evidence, a `www`/`http`
/// service name, or a well-known web port when the name is missing.
fn is_web(item: &ReportItem, port: &str) -> bool {
    if item.web.is_some() {
        return true;
    }
    if item.service.is_empty() {
        return WEB_PORTS.contains(&port);
    }
    let service = item.service.to_lowercase();
    WEB_PREFIXES.iter().any(|prefix| service.starts_with(prefix))
}

fn vuln_details(item: &ReportItem) -> VulnDetails {
    VulnDetails {
        name: item.name.clone(),
        description: item.description.clone(),
        severity: item.severity_or_info(),
        resolution: item.resolution.clone(),
        references: item.references.clone(),
        external_id: item.external_id.clone(),
        data: item.data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::severity::Severity;
    use crate::services::sink::{RecordingSink, SinkRecord};

    fn item(subnet: &str, port: Option<&str>, service: &str, severity: Severity) -> ReportItem {
        ReportItem {
            host: subnet.to_string(),
            subnet: subnet.to_string(),
            port: port.map(String::from),
            protocol: "tcp".to_string(),
            service: service.to_string(),
            severity: Some(severity),
            name: "finding".to_string(),
            ..ReportItem::default()
        }
    }

    #[test]
    fn same_subnet_and_port_share_one_service() {
        let mut sink = RecordingSink::new();
        let mut builder = ReportBuilder::new(&mut sink, false);
        builder.add_item(item("10.0.0.1", Some("22"), "ssh", Severity::High)).unwrap();
        builder.add_item(item("10.0.0.1", Some("22"), "ssh", Severity::Low)).unwrap();

        assert_eq!(sink.hosts().count(), 1);
        assert_eq!(sink.services().count(), 1);
        let service_id = sink.services().next().unwrap().0;
        let vuln_services: Vec<Uuid> = sink
            .records()
            .iter()
            .filter_map(|r| match r {
                SinkRecord::VulnService { service_id, .. } => Some(*service_id),
                _ => None,
            })
            .collect();
        assert_eq!(vuln_services, [service_id, service_id]);
    }

    #[test]
    fn hostless_item_becomes_host_vuln() {
        let mut sink = RecordingSink::new();
        let mut builder = ReportBuilder::new(&mut sink, false);
        builder.add_item(item("10.0.0.1", None, "general", Severity::Medium)).unwrap();
        assert!(matches!(sink.records()[1], SinkRecord::VulnHost { .. }));
        assert_eq!(sink.services().count(), 0);
    }

    #[test]
    fn ignored_severity_still_creates_host_and_service() {
        let mut sink = RecordingSink::new();
        let mut builder = ReportBuilder::new(&mut sink, false);
        builder.add_item(item("10.0.0.1", Some("25"), "smtp", Severity::Log)).unwrap();
        builder.add_item(item("10.0.0.2", None, "general", Severity::Debug)).unwrap();
        assert_eq!(sink.hosts().count(), 2);
        assert_eq!(sink.services().count(), 1);
        assert_eq!(sink.vuln_count(), 0);
    }

    #[test]
    fn web_service_is_annotated_once() {
        let mut sink = RecordingSink::new();
        let mut builder = ReportBuilder::new(&mut sink, false);
        builder.add_item(item("10.0.0.1", Some("443"), "HTTPS", Severity::High)).unwrap();
        builder.add_item(item("10.0.0.1", Some("443"), "HTTPS", Severity::Low)).unwrap();

        assert_eq!(sink.notes().count(), 2);
        let web_vulns = sink
            .records()
            .iter()
            .filter(|r| matches!(r, SinkRecord::VulnWebService { .. }))
            .count();
        assert_eq!(web_vulns, 2);
    }

    #[test]
    fn empty_service_name_uses_web_ports() {
        assert!(is_web(&item("h", Some("8080"), "", Severity::Low), "8080"));
        assert!(!is_web(&item("h", Some("8443"), "", Severity::Low), "8443"));
        assert!(is_web(&item("h", Some("8443"), "www-alt", Severity::Low), "8443"));
        assert!(!is_web(&item("h", Some("80"), "Unknown", Severity::Low), "80"));
    }

    #[test]
    fn unknown_subnet_synthesizes_host_once() {
        let mut sink = RecordingSink::new();
        let mut builder = ReportBuilder::new(&mut sink, false);
        let mut first = item("192.168.1.0", Some("21"), "ftp", Severity::Medium);
        first.host = "192.168.1.7".to_string();
        builder.add_item(first.clone()).unwrap();
        builder.add_item(first).unwrap();

        let hosts: Vec<&NewHost> = sink.hosts().map(|(_, h)| h).collect();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].ip, "192.168.1.0");
        assert_eq!(hosts[0].hostnames, ["192.168.1.7"]);
    }

    #[test]
    fn interface_formats_link_services_to_interfaces() {
        let registry: HostRegistry = [HostRecord::builder("fe80::10")
            .detail(MAC_ADDRESS_TAG, "00:11:22:33:44:55")
            .detail(OPERATING_SYSTEM_TAG, "FreeBSD")
            .hostname("gw.local")
            .build()]
        .into_iter()
        .collect();

        let mut sink = RecordingSink::new();
        let mut builder = ReportBuilder::new(&mut sink, true);
        builder.add_hosts(&registry).unwrap();
        builder.add_item(item("fe80::10", Some("22"), "ssh", Severity::Low)).unwrap();

        let interface = sink.interfaces().next().unwrap();
        assert_eq!(interface.ipv6_address.as_deref(), Some("fe80::10"));
        assert_eq!(interface.mac.as_deref(), Some("00:11:22:33:44:55"));
        assert_eq!(sink.hosts().next().unwrap().1.os.as_deref(), Some("FreeBSD"));
        let (_, service) = sink.services().next().unwrap();
        assert!(service.interface_id.is_some());
        assert_eq!(service.status.as_deref(), Some("open"));
    }
}
