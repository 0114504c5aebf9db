//! Observability infrastructure for the probe
//!
//! Provides:
//! - Prometheus self-metrics (sample latency, error counters, last values)
//! - Structured JSON logging of lifecycle events with tracing

use crate::models::{HostSample, ServiceDescriptor};
use prometheus::{
    register_gauge, register_histogram, register_int_gauge, Gauge, Histogram, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for sampling latency (in seconds); a CPU read waits at
/// least one sysinfo refresh interval
const SAMPLE_LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

static GLOBAL_METRICS: OnceLock<ProbeMetricsInner> = OnceLock::new();

struct ProbeMetricsInner {
    sample_latency_seconds: Histogram,
    sample_errors: IntGauge,
    discovery_errors: IntGauge,
    services_discovered: IntGauge,
    cpu_usage_percent: Gauge,
    memory_usage_percent: Gauge,
}

impl ProbeMetricsInner {
    fn new() -> Self {
        Self {
            sample_latency_seconds: register_histogram!(
                "service_probe_sample_latency_seconds",
                "Time spent sampling host CPU and memory",
                SAMPLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register sample_latency_seconds"),

            sample_errors: register_int_gauge!(
                "service_probe_sample_errors_total",
                "Total number of failed host samples"
            )
            .expect("Failed to register sample_errors"),

            discovery_errors: register_int_gauge!(
                "service_probe_discovery_errors_total",
                "Total number of failed service discovery queries"
            )
            .expect("Failed to register discovery_errors"),

            services_discovered: register_int_gauge!(
                "service_probe_services_discovered",
                "Number of services in the current snapshot"
            )
            .expect("Failed to register services_discovered"),

            cpu_usage_percent: register_gauge!(
                "service_probe_cpu_usage_percent",
                "Host CPU usage from the last successful sample"
            )
            .expect("Failed to register cpu_usage_percent"),

            memory_usage_percent: register_gauge!(
                "service_probe_memory_usage_percent",
                "Host memory usage from the last successful sample"
            )
            .expect("Failed to register memory_usage_percent"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct ProbeMetrics {
    _private: (),
}

impl Default for ProbeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeMetrics {
    /// Create a new handle (registers the metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ProbeMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ProbeMetricsInner {
        GLOBAL_METRICS.get_or_init(ProbeMetricsInner::new)
    }

    pub fn observe_sample_latency(&self, duration_secs: f64) {
        self.inner().sample_latency_seconds.observe(duration_secs);
    }

    pub fn record_sample(&self, sample: &HostSample) {
        self.inner().cpu_usage_percent.set(sample.cpu_percent);
        self.inner().memory_usage_percent.set(sample.memory_percent);
    }

    pub fn inc_sample_errors(&self) {
        self.inner().sample_errors.inc();
    }

    pub fn inc_discovery_errors(&self) {
        self.inner().discovery_errors.inc();
    }

    pub fn set_services_discovered(&self, count: usize) {
        self.inner().services_discovered.set(count as i64);
    }
}

/// Structured logger for probe lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, port: u16) {
        info!(
            event = "probe_started",
            service = %self.service_name,
            probe_version = %version,
            port = port,
            "Service probe started, snapshot served at /metrics"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "probe_shutdown",
            service = %self.service_name,
            reason = %reason,
            "Service probe shutting down"
        );
    }

    pub fn log_sample(&self, sample: &HostSample) {
        info!(
            event = "metrics_collected",
            service = %self.service_name,
            cpu_usage_percent = sample.cpu_percent,
            memory_usage_percent = sample.memory_percent,
            sampled_at = %sample.sampled_at,
            "Metrics collected"
        );
    }

    /// Log each discovered service with its in-cluster URL
    pub fn log_discovered(&self, namespace: &str, selector: &str, services: &[ServiceDescriptor]) {
        if services.is_empty() {
            info!(
                event = "services_discovered",
                service = %self.service_name,
                namespace = %namespace,
                label_selector = %selector,
                count = 0,
                "No services found"
            );
            return;
        }

        for svc in services {
            match svc.primary_url() {
                Some(url) => info!(
                    event = "service_found",
                    service = %self.service_name,
                    name = %svc.name,
                    namespace = %svc.namespace,
                    cluster_ip = %svc.cluster_ip,
                    ports = svc.ports.len(),
                    url = %url,
                    "Discovered service"
                ),
                None => info!(
                    event = "service_found",
                    service = %self.service_name,
                    name = %svc.name,
                    namespace = %svc.namespace,
                    cluster_ip = %svc.cluster_ip,
                    "Discovered service with no ports defined"
                ),
            }
        }

        info!(
            event = "services_discovered",
            service = %self.service_name,
            namespace = %namespace,
            label_selector = %selector,
            count = services.len(),
            "Service discovery complete"
        );
    }

    pub fn log_discovery_failure(&self, error: &dyn std::fmt::Display, configuration: bool) {
        warn!(
            event = "discovery_failed",
            service = %self.service_name,
            configuration_error = configuration,
            error = %error,
            "Service discovery failed, serving metrics only"
        );
    }
}
