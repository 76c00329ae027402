//! Domain models: host registry, intermediate report items, canonical entities.

pub mod entity;
pub mod host;
pub mod item;
pub mod severity;
