//! Probe configuration

use anyhow::{Context, Result};
use probe_lib::collector::CollectionConfig;
use probe_lib::discovery::DiscoverySettings;
use serde::Deserialize;
use std::time::Duration;

/// Probe configuration, read once from the environment at startup
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// HTTP port for the snapshot and health endpoints
    #[serde(default = "default_port")]
    pub port: u16,

    /// Namespace to discover services in
    #[serde(default)]
    pub namespace: Option<String>,

    /// Our own service name, excluded from discovery
    #[serde(default)]
    pub service_name: Option<String>,

    /// Label selector for discovery; unset matches every service
    #[serde(default)]
    pub discover_service_label_selector: Option<String>,

    /// Pod name from the Kubernetes downward API
    #[serde(default)]
    pub my_pod_name: Option<String>,

    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    #[serde(default = "default_sample_timeout")]
    pub sample_timeout_secs: u64,

    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_collection_interval() -> u64 {
    15
}

fn default_sample_timeout() -> u64 {
    5
}

fn default_discovery_timeout() -> u64 {
    30
}

impl ProbeConfig {
    /// Load configuration from environment variables (`PORT`, `NAMESPACE`, ...)
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment)
            .build()
            .context("Failed to read environment")?;

        let probe: ProbeConfig = config
            .try_deserialize()
            .context("Invalid probe configuration")?;

        if probe.collection_interval_secs == 0 {
            anyhow::bail!("COLLECTION_INTERVAL_SECS must be greater than zero");
        }

        Ok(probe)
    }

    pub fn collection(&self) -> CollectionConfig {
        CollectionConfig {
            interval: Duration::from_secs(self.collection_interval_secs),
            sample_timeout: Duration::from_secs(self.sample_timeout_secs),
        }
    }

    pub fn discovery(&self) -> DiscoverySettings {
        DiscoverySettings {
            namespace: self.namespace.clone(),
            label_selector: self.discover_service_label_selector.clone(),
            self_name: self.service_name.clone(),
            timeout: Duration::from_secs(self.discovery_timeout_secs),
        }
    }
}
