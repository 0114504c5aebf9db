//! Shared snapshot store
//!
//! Holds the latest host sample and the latest discovered service list.
//! Writers replace whole units under the write lock; readers get an owned
//! copy, so a reader never sees cpu, memory and timestamp from different
//! sampling passes.

use crate::models::{format_timestamp, HostSample, MetricsSnapshot, ServiceDescriptor};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug)]
struct StoreInner {
    snapshot: MetricsSnapshot,
    samples_recorded: u64,
}

/// Cloneable handle to the process-wide snapshot
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SnapshotStore {
    pub fn new(pod_name: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                snapshot: MetricsSnapshot::placeholder(pod_name),
                samples_recorded: 0,
            })),
        }
    }

    /// Apply one sampling pass; cpu, memory and timestamp change together
    pub async fn record_sample(&self, sample: &HostSample) {
        let mut inner = self.inner.write().await;
        inner.snapshot.cpu_usage_percent = sample.cpu_percent;
        inner.snapshot.memory_usage_percent = sample.memory_percent;
        inner.snapshot.last_updated_utc = format_timestamp(sample.sampled_at);
        inner.samples_recorded += 1;
    }

    /// Swap in a freshly discovered service list
    pub async fn replace_services(&self, services: Vec<ServiceDescriptor>) {
        let mut inner = self.inner.write().await;
        debug!(
            previous = inner.snapshot.available_services.len(),
            current = services.len(),
            "Replacing service list"
        );
        inner.snapshot.available_services = services;
    }

    /// Owned copy of the current snapshot
    pub async fn current(&self) -> MetricsSnapshot {
        self.inner.read().await.snapshot.clone()
    }

    /// Number of successful samples applied so far
    pub async fn samples_recorded(&self) -> u64 {
        self.inner.read().await.samples_recorded
    }

    pub async fn has_sample(&self) -> bool {
        self.samples_recorded().await > 0
    }
}
