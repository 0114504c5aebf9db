//! Core data models for the service probe

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot served by `GET /metrics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub last_updated_utc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_pod_name: Option<String>,
    pub available_services: Vec<ServiceDescriptor>,
}

impl MetricsSnapshot {
    /// Zeroed placeholder used until the first successful sample
    pub fn placeholder(pod_name: Option<String>) -> Self {
        Self {
            cpu_usage_percent: 0.0,
            memory_usage_percent: 0.0,
            last_updated_utc: format_timestamp(Utc::now()),
            kubernetes_pod_name: pod_name,
            available_services: Vec::new(),
        }
    }
}

/// A sibling service found in the service registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub namespace: String,
    pub cluster_ip: String,
    pub ports: Vec<PortDescriptor>,
    pub labels: BTreeMap<String, String>,
}

impl ServiceDescriptor {
    /// In-cluster DNS URL for one of the service's ports
    pub fn cluster_url(&self, port: i32) -> String {
        format!(
            "http://{}.{}.svc.cluster.local:{}",
            self.name, self.namespace, port
        )
    }

    /// URL of the first declared port, if any
    pub fn primary_url(&self) -> Option<String> {
        self.ports.first().map(|p| self.cluster_url(p.port))
    }
}

/// A declared service port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub name: String,
    pub port: i32,
    pub protocol: String,
    /// Numeric target port, 0 when the target is a named port
    pub target_port: i32,
}

/// Raw values read from the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostReading {
    pub cpu_percent: f64,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
}

/// One rounded, timestamped sampling pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub sampled_at: DateTime<Utc>,
}

/// RFC 3339 in UTC with millisecond precision, e.g. `2026-01-01T00:00:00.000Z`
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
