//! Canonical entities emitted to a sink.

use serde::Serialize;
use uuid::Uuid;

use crate::models::severity::Severity;

/// Address family guessed from an address string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Four dot-separated components means IPv4; anything else is IPv6.
    pub fn classify(address: &str) -> Self {
        if address.split('.').count() == 4 {
            Self::V4
        } else {
            Self::V6
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewHost {
    pub ip: String,
    pub hostnames: Vec<String>,
    pub os: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewInterface {
    pub host_id: Uuid,
    pub name: String,
    pub mac: Option<String>,
    pub ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
    pub hostname_resolution: Vec<String>,
}

impl NewInterface {
    /// Interface for `ip`, with the address filed under its guessed family.
    pub fn for_address(
        host_id: Uuid,
        ip: &str,
        mac: Option<String>,
        hostname_resolution: Vec<String>,
    ) -> Self {
        let (ipv4_address, ipv6_address) = match IpFamily::classify(ip) {
            IpFamily::V4 => (Some(ip.to_string()), None),
            IpFamily::V6 => (None, Some(ip.to_string())),
        };
        Self {
            host_id,
            name: ip.to_string(),
            mac,
            ipv4_address,
            ipv6_address,
            hostname_resolution,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewService {
    pub host_id: Uuid,
    pub interface_id: Option<Uuid>,
    pub name: String,
    pub protocol: String,
    pub ports: Vec<String>,
    pub status: Option<String>,
}

/// Fields common to every vulnerability variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VulnDetails {
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub resolution: String,
    pub references: Vec<String>,
    pub external_id: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewWebVuln {
    #[serde(flatten)]
    pub details: VulnDetails,
    pub website: String,
    pub path: Option<String>,
    pub method: Option<String>,
    pub response: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNote {
    pub name: String,
    pub text: String,
}
