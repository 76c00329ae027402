//! Resolution, emission and orchestration services.

pub mod builder;
pub mod ingestion;
pub mod port_mapper;
pub mod service_resolver;
pub mod sink;
