//! Library for the service probe sidecar
//!
//! This crate provides the core functionality for:
//! - Host CPU and memory sampling on a fixed interval
//! - Discovery of sibling services through the Kubernetes API
//! - A shared snapshot combining both, served over HTTP
//! - Health checks and observability

pub mod api;
pub mod collector;
pub mod discovery;
pub mod health;
pub mod models;
pub mod observability;
pub mod store;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
    UNHEALTHY_AFTER_FAILURES,
};
pub use models::*;
pub use observability::{ProbeMetrics, StructuredLogger};
pub use store::SnapshotStore;
