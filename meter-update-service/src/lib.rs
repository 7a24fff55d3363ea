pub mod config;
pub mod hierarchy;
pub mod metrics_server;
pub mod observability;
pub mod readers;
pub mod update;

#[cfg(test)]
pub(crate) mod testsupport;

pub use hierarchy::GroupHierarchyEngine;
pub use update::{CycleReport, UpdateOrchestrator};
