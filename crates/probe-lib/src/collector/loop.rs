//! Metrics collection loop
//!
//! Re-samples the host on a fixed interval and applies each successful
//! sample to the snapshot store. Startup takes the first sample through
//! [`CollectionLoop::collect_once`]; [`CollectionLoop::run`] takes over
//! one interval later and runs until shutdown is signalled.

use super::{HostProbe, Sampler};
use crate::health::{components, ComponentStatus, HealthRegistry, UNHEALTHY_AFTER_FAILURES};
use crate::observability::{ProbeMetrics, StructuredLogger};
use crate::store::SnapshotStore;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Configuration for the metrics collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Period between samples (default: 15 seconds)
    pub interval: Duration,
    /// Upper bound for one host read (default: 5 seconds)
    pub sample_timeout: Duration,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            sample_timeout: Duration::from_secs(5),
        }
    }
}

/// Periodic sampler feeding the snapshot store
pub struct CollectionLoop {
    sampler: Sampler,
    store: SnapshotStore,
    health: HealthRegistry,
    metrics: ProbeMetrics,
    logger: StructuredLogger,
    config: CollectionConfig,
}

impl CollectionLoop {
    pub fn new(
        probe: Arc<dyn HostProbe>,
        store: SnapshotStore,
        health: HealthRegistry,
        logger: StructuredLogger,
        config: CollectionConfig,
    ) -> Self {
        Self {
            sampler: Sampler::new(probe, config.sample_timeout),
            store,
            health,
            metrics: ProbeMetrics::new(),
            logger,
            config,
        }
    }

    /// Run one sampling cycle
    ///
    /// Returns false when the host could not be read; the stored snapshot
    /// is left exactly as it was in that case.
    pub async fn collect_once(&self) -> bool {
        let start = Instant::now();

        match self.sampler.sample().await {
            Ok(sample) => {
                self.store.record_sample(&sample).await;
                self.metrics.observe_sample_latency(start.elapsed().as_secs_f64());
                self.metrics.record_sample(&sample);
                self.health.set_healthy(components::COLLECTOR).await;
                self.logger.log_sample(&sample);
                true
            }
            Err(e) => {
                self.metrics.inc_sample_errors();
                let status = self
                    .health
                    .record_failure(components::COLLECTOR, e.to_string())
                    .await;
                warn!(error = %e, "Failed to collect host metrics, keeping previous values");
                if status == ComponentStatus::Unhealthy {
                    error!(
                        threshold = UNHEALTHY_AFTER_FAILURES,
                        "Host sampling keeps failing, collector reported unhealthy"
                    );
                }
                false
            }
        }
    }

    /// Run until `shutdown` fires or its sender is dropped
    ///
    /// Cycles run inline on this task, so at most one sample is in flight;
    /// ticks missed while a slow sample runs are skipped.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            timeout_ms = self.sampler.timeout().as_millis() as u64,
            "Starting metrics collection loop"
        );

        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut cycles = 0u64;
        let mut failures = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cycles += 1;
                    if !self.collect_once().await {
                        failures += 1;
                    }
                    debug!(cycles, failures, "Collection cycle complete");
                }
                _ = shutdown.recv() => {
                    info!(cycles, failures, "Shutting down metrics collection loop");
                    break;
                }
            }
        }
    }
}

/// Builder for creating the collection loop
pub struct CollectionLoopBuilder {
    probe: Option<Arc<dyn HostProbe>>,
    store: Option<SnapshotStore>,
    health: HealthRegistry,
    logger: StructuredLogger,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    pub fn new() -> Self {
        Self {
            probe: None,
            store: None,
            health: HealthRegistry::new(),
            logger: StructuredLogger::new(env!("CARGO_PKG_NAME")),
            config: CollectionConfig::default(),
        }
    }

    pub fn probe(mut self, probe: Arc<dyn HostProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn sample_timeout(mut self, timeout: Duration) -> Self {
        self.config.sample_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<CollectionLoop> {
        let probe = self
            .probe
            .ok_or_else(|| anyhow::anyhow!("Host probe is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Snapshot store is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Collection interval must be greater than zero");
        }

        Ok(CollectionLoop::new(
            probe,
            store,
            self.health,
            self.logger,
            self.config,
        ))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
