//! Per-run host registry built from a report's asset section.

use std::collections::HashMap;

use serde::Serialize;

/// Detail name whose values are `port,state,service` records.
pub const SERVICES_DETAIL: &str = "Services";

/// Detail name routed into the hostname list instead of the detail map.
pub const HOSTNAME_DETAIL: &str = "hostname";

/// Substring marking scan-engine bookkeeping details that are discarded.
pub const BOOKKEEPING_MARKER: &str = "EXIT";

/// Multi-valued host details in insertion order.
///
/// `Services` is kept apart because the service resolver consults it first
/// and parses its values as comma records; every other name lands in the
/// ordered `other` bucket. Duplicate values are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailMap {
    services: Vec<String>,
    other: Vec<(String, Vec<String>)>,
}

impl DetailMap {
    fn push(&mut self, name: String, value: String) {
        if name == SERVICES_DETAIL {
            self.services.push(value);
            return;
        }
        match self.other.iter_mut().find(|(key, _)| *key == name) {
            Some((_, values)) => values.push(value),
            None => self.other.push((name, vec![value])),
        }
    }

    /// Values of the `Services` detail.
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// All non-`Services` details in the order their names first appeared.
    pub fn other(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.other
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        if name == SERVICES_DETAIL {
            return (!self.services.is_empty()).then_some(self.services.as_slice());
        }
        self.other
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values.as_slice())
    }

    /// First non-empty value recorded under `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)?
            .iter()
            .map(String::as_str)
            .find(|value| !value.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.other.is_empty()
    }
}

/// One asset with its hostnames and details. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostRecord {
    address: String,
    hostnames: Vec<String>,
    details: DetailMap,
}

impl HostRecord {
    pub fn builder(address: impl Into<String>) -> HostRecordBuilder {
        HostRecordBuilder {
            address: address.into(),
            hostnames: Vec::new(),
            details: DetailMap::default(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    pub fn details(&self) -> &DetailMap {
        &self.details
    }
}

/// Accumulates details for a single host before freezing it.
#[derive(Debug)]
pub struct HostRecordBuilder {
    address: String,
    hostnames: Vec<String>,
    details: DetailMap,
}

impl HostRecordBuilder {
    /// Route one (name, value) detail pair.
    ///
    /// `hostname` goes to the hostname list, names containing `EXIT` are
    /// dropped, everything else is appended under its name.
    pub fn detail(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name.contains(BOOKKEEPING_MARKER) {
            return self;
        }
        if name == HOSTNAME_DETAIL {
            self.hostnames.push(value);
        } else {
            self.details.push(name, value);
        }
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostnames.push(hostname.into());
        self
    }

    pub fn build(self) -> HostRecord {
        HostRecord {
            address: self.address,
            hostnames: self.hostnames,
            details: self.details,
        }
    }
}

/// Hosts of one run keyed by address, iterated in source order.
#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    hosts: Vec<HostRecord>,
    index: HashMap<String, usize>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host. A repeated address replaces the earlier record in place.
    pub fn insert(&mut self, record: HostRecord) {
        match self.index.get(record.address()) {
            Some(&slot) => self.hosts[slot] = record,
            None => {
                self.index.insert(record.address.clone(), self.hosts.len());
                self.hosts.push(record);
            }
        }
    }

    pub fn get(&self, address: &str) -> Option<&HostRecord> {
        self.index.get(address).map(|&slot| &self.hosts[slot])
    }

    pub fn contains(&self, address: &str) -> bool {
        self.index.contains_key(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostRecord> {
        self.hosts.iter()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl FromIterator<HostRecord> for HostRegistry {
    fn from_iter<I: IntoIterator<Item = HostRecord>>(iter: I) -> Self {
        let mut registry = Self::new();
        for record in iter {
            registry.insert(record);
        }
        registry
    }
}
