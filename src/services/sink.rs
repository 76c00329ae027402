//! Sink contract consumed by the builder, plus an in-memory recorder.

use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::entity::{NewHost, NewInterface, NewNote, NewService, NewWebVuln, VulnDetails};

/// Persists canonical entities and hands back their identifiers.
///
/// The builder guarantees at most one `create_host` per subnet and one
/// `create_service` per (subnet, port) within a run; anything beyond that
/// is the sink's business.
pub trait Sink {
    fn create_host(&mut self, host: NewHost) -> Result<Uuid, AppError>;

    fn create_interface(&mut self, interface: NewInterface) -> Result<Uuid, AppError>;

    fn create_service(&mut self, service: NewService) -> Result<Uuid, AppError>;

    fn create_vuln_host(&mut self, host_id: Uuid, vuln: VulnDetails) -> Result<Uuid, AppError>;

    fn create_vuln_service(
        &mut self,
        host_id: Uuid,
        service_id: Uuid,
        vuln: VulnDetails,
    ) -> Result<Uuid, AppError>;

    fn create_vuln_web_service(
        &mut self,
        host_id: Uuid,
        service_id: Uuid,
        vuln: NewWebVuln,
    ) -> Result<Uuid, AppError>;

    fn create_note(
        &mut self,
        host_id: Uuid,
        service_id: Uuid,
        note: NewNote,
    ) -> Result<Uuid, AppError>;

    fn create_note_on_note(
        &mut self,
        host_id: Uuid,
        service_id: Uuid,
        parent_id: Uuid,
        note: NewNote,
    ) -> Result<Uuid, AppError>;
}

/// One call received by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkRecord {
    Host {
        id: Uuid,
        entity: NewHost,
    },
    Interface {
        id: Uuid,
        entity: NewInterface,
    },
    Service {
        id: Uuid,
        entity: NewService,
    },
    VulnHost {
        id: Uuid,
        host_id: Uuid,
        entity: VulnDetails,
    },
    VulnService {
        id: Uuid,
        host_id: Uuid,
        service_id: Uuid,
        entity: VulnDetails,
    },
    VulnWebService {
        id: Uuid,
        host_id: Uuid,
        service_id: Uuid,
        entity: NewWebVuln,
    },
    Note {
        id: Uuid,
        host_id: Uuid,
        service_id: Uuid,
        parent_id: Option<Uuid>,
        entity: NewNote,
    },
}

/// Sink that keeps every call in order, for inspection and JSON output.
#[derive(Debug, Default, Serialize)]
pub struct RecordingSink {
    records: Vec<SinkRecord>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[SinkRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SinkRecord> {
        self.records
    }

    pub fn hosts(&self) -> impl Iterator<Item = (Uuid, &NewHost)> {
        self.records.iter().filter_map(|record| match record {
            SinkRecord::Host { id, entity } => Some((*id, entity)),
            _ => None,
        })
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &NewInterface> {
        self.records.iter().filter_map(|record| match record {
            SinkRecord::Interface { entity, .. } => Some(entity),
            _ => None,
        })
    }

    pub fn services(&self) -> impl Iterator<Item = (Uuid, &NewService)> {
        self.records.iter().filter_map(|record| match record {
            SinkRecord::Service { id, entity } => Some((*id, entity)),
            _ => None,
        })
    }

    /// Count of vulnerability records of any variant.
    pub fn vuln_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| {
                matches!(
                    record,
                    SinkRecord::VulnHost { .. }
                        | SinkRecord::VulnService { .. }
                        | SinkRecord::VulnWebService { .. }
                )
            })
            .count()
    }

    pub fn notes(&self) -> impl Iterator<Item = &SinkRecord> {
        self.records
            .iter()
            .filter(|record| matches!(record, SinkRecord::Note { .. }))
    }

    fn push(&mut self, make: impl FnOnce(Uuid) -> SinkRecord) -> Uuid {
        let id = Uuid::now_v7();
        self.records.push(make(id));
        id
    }
}

impl Sink for RecordingSink {
    fn create_host(&mut self, host: NewHost) -> Result<Uuid, AppError> {
        Ok(self.push(|id| SinkRecord::Host { id, entity: host }))
    }

    fn create_interface(&mut self, interface: NewInterface) -> Result<Uuid, AppError> {
        Ok(self.push(|id| SinkRecord::Interface {
            id,
            entity: interface,
        }))
    }

    fn create_service(&mut self, service: NewService) -> Result<Uuid, AppError> {
        Ok(self.push(|id| SinkRecord::Service {
            id,
            entity: service,
        }))
    }

    fn create_vuln_host(&mut self, host_id: Uuid, vuln: VulnDetails) -> Result<Uuid, AppError> {
        Ok(self.push(|id| SinkRecord::VulnHost {
            id,
            host_id,
            entity: vuln,
        }))
    }

    fn create_vuln_service(
        &mut self,
        host_id: Uuid,
        service_id: Uuid,
        vuln: VulnDetails,
    ) -> Result<Uuid, AppError> {
        Ok(self.push(|id| SinkRecord::VulnService {
            id,
            host_id,
            service_id,
            entity: vuln,
        }))
    }

    fn create_vuln_web_service(
        &mut self,
        host_id: Uuid,
        service_id: Uuid,
        vuln: NewWebVuln,
    ) -> Result<Uuid, AppError> {
        Ok(self.push(|id| SinkRecord::VulnWebService {
            id,
            host_id,
            service_id,
            entity: vuln,
        }))
    }

    fn create_note(
        &mut self,
        host_id: Uuid,
        service_id: Uuid,
        note: NewNote,
    ) -> Result<Uuid, AppError> {
        Ok(self.push(|id| SinkRecord::Note {
            id,
            host_id,
            service_id,
            parent_id: None,
            entity: note,
        }))
    }

    fn create_note_on_note(
        &mut self,
        host_id: Uuid,
        service_id: Uuid,
        parent_id: Uuid,
        note: NewNote,
    ) -> Result<Uuid, AppError> {
        Ok(self.push(|id| SinkRecord::Note {
            id,
            host_id,
            service_id,
            parent_id: Some(parent_id),
            entity: note,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order_with_distinct_ids() {
        let mut sink = RecordingSink::new();
        let host_id = sink
            .create_host(NewHost {
                ip: "10.0.0.1".to_string(),
                hostnames: vec![],
                os: None,
            })
            .unwrap();
        let service_id = sink
            .create_service(NewService {
                host_id,
                interface_id: None,
                name: "ssh".to_string(),
                protocol: "tcp".to_string(),
                ports: vec!["22".to_string()],
                status: None,
            })
            .unwrap();
        assert_ne!(host_id, service_id);
        assert_eq!(sink.records().len(), 2);
        assert_eq!(sink.hosts().count(), 1);
        assert_eq!(sink.services().next().unwrap().0, service_id);
    }

    #[test]
    fn into_records_hands_over_call_log() {
        let mut sink = RecordingSink::new();
        let host_id = sink
            .create_host(NewHost {
                ip: "10.0.0.2".to_string(),
                hostnames: vec!["db".to_string()],
                os: None,
            })
            .unwrap();
        let records = sink.into_records();
        assert_eq!(records.len(), 1);
        assert!(matches!(
            &records[0],
            SinkRecord::Host { id, entity } if *id == host_id && entity.ip == "10.0.0.2"
        ));
    }

    #[test]
    fn record_serializes_with_kind_tag() {
        let mut sink = RecordingSink::new();
        sink.create_note(
            Uuid::nil(),
            Uuid::nil(),
            NewNote {
                name: "website".to_string(),
                text: String::new(),
            },
        )
        .unwrap();
        let json = serde_json::to_value(&sink.records()[0]).unwrap();
        assert_eq!(json["kind"], "note");
        assert_eq!(json["entity"]["name"], "website");
        assert!(json["parent_id"].is_null());
    }
}
