//! Sibling service discovery
//!
//! Lists the Service objects in one namespace (optionally filtered by a
//! label selector) and turns them into [`ServiceDescriptor`]s. This is a
//! point-in-time query, not a watch.

mod kube_source;

pub use kube_source::KubeServiceSource;

use crate::health::{components, HealthRegistry};
use crate::models::{PortDescriptor, ServiceDescriptor};
use crate::observability::{ProbeMetrics, StructuredLogger};
use crate::store::SnapshotStore;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Name the control plane uses for its own API service
pub const BOOTSTRAP_SERVICE_NAME: &str = "kubernetes";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiscoveryError {
    #[error("not running in cluster: {0}")]
    NotInCluster(String),

    #[error("namespace is not set")]
    MissingNamespace,

    #[error("own service name is not set")]
    MissingSelfIdentity,

    #[error("failed to list services: {0}")]
    QueryFailed(String),

    #[error("service discovery timed out after {0:?}")]
    Timeout(Duration),
}

impl DiscoveryError {
    /// Configuration problems will not go away by retrying
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DiscoveryError::NotInCluster(_)
                | DiscoveryError::MissingNamespace
                | DiscoveryError::MissingSelfIdentity
        )
    }
}

/// Inputs for one discovery query
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub namespace: Option<String>,
    /// Empty or absent matches every service in the namespace
    pub label_selector: Option<String>,
    pub self_name: Option<String>,
    pub timeout: Duration,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            namespace: None,
            label_selector: None,
            self_name: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Validated query parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryQuery<'a> {
    pub namespace: &'a str,
    pub label_selector: Option<&'a str>,
    pub self_name: &'a str,
}

impl DiscoverySettings {
    pub fn validate(&self) -> Result<DiscoveryQuery<'_>, DiscoveryError> {
        let namespace = non_empty(&self.namespace).ok_or(DiscoveryError::MissingNamespace)?;
        let self_name = non_empty(&self.self_name).ok_or(DiscoveryError::MissingSelfIdentity)?;

        Ok(DiscoveryQuery {
            namespace,
            label_selector: non_empty(&self.label_selector),
            self_name,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Source of raw Service objects
#[async_trait]
pub trait ServiceSource: Send + Sync {
    async fn list_services(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Service>, DiscoveryError>;
}

/// Query the registry and return every service except the control plane's
/// own entry and the caller
pub async fn discover(
    source: &dyn ServiceSource,
    settings: &DiscoverySettings,
) -> Result<Vec<ServiceDescriptor>, DiscoveryError> {
    let query = settings.validate()?;

    info!(
        namespace = %query.namespace,
        label_selector = query.label_selector.unwrap_or(""),
        "Discovering services"
    );

    let services = tokio::time::timeout(
        settings.timeout,
        source.list_services(query.namespace, query.label_selector),
    )
    .await
    .map_err(|_| DiscoveryError::Timeout(settings.timeout))??;

    let mut discovered = Vec::with_capacity(services.len());
    for service in &services {
        let name = service.metadata.name.as_deref().unwrap_or_default();

        if name == BOOTSTRAP_SERVICE_NAME {
            continue;
        }
        if name == query.self_name {
            debug!(name = %name, "Skipping self");
            continue;
        }

        discovered.push(describe_service(service));
    }

    Ok(discovered)
}

/// Convert a Service object; missing fields fall back to empty values
pub fn describe_service(service: &Service) -> ServiceDescriptor {
    let spec = service.spec.as_ref();

    ServiceDescriptor {
        name: service.metadata.name.clone().unwrap_or_default(),
        namespace: service.metadata.namespace.clone().unwrap_or_default(),
        cluster_ip: spec.and_then(|s| s.cluster_ip.clone()).unwrap_or_default(),
        ports: spec
            .and_then(|s| s.ports.as_ref())
            .map(|ports| ports.iter().map(describe_port).collect())
            .unwrap_or_default(),
        labels: service.metadata.labels.clone().unwrap_or_default(),
    }
}

// Named target ports would need the pod specs to resolve; they stay 0
fn describe_port(port: &ServicePort) -> PortDescriptor {
    let target_port = match &port.target_port {
        Some(IntOrString::Int(value)) => *value,
        Some(IntOrString::String(_)) | None => 0,
    };

    PortDescriptor {
        name: port.name.clone().unwrap_or_default(),
        port: port.port,
        protocol: port.protocol.clone().unwrap_or_default(),
        target_port,
    }
}

/// Startup seeding of the service list
///
/// `source` is the result of building the registry client, so credential
/// failures take the same path as query failures. Any error is logged, the
/// discovery component is marked degraded and the stored list is left as
/// it was; the probe keeps serving metrics either way.
pub async fn seed_services(
    store: &SnapshotStore,
    health: &HealthRegistry,
    logger: &StructuredLogger,
    source: Result<&dyn ServiceSource, DiscoveryError>,
    settings: &DiscoverySettings,
) -> Result<usize, DiscoveryError> {
    let metrics = ProbeMetrics::new();

    let result = match source {
        Ok(source) => discover(source, settings).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(services) => {
            let count = services.len();
            logger.log_discovered(
                settings.namespace.as_deref().unwrap_or_default(),
                settings.label_selector.as_deref().unwrap_or_default(),
                &services,
            );
            store.replace_services(services).await;
            metrics.set_services_discovered(count);
            health.set_healthy(components::DISCOVERY).await;
            Ok(count)
        }
        Err(e) => {
            metrics.inc_discovery_errors();
            logger.log_discovery_failure(&e, e.is_configuration());
            health.record_failure(components::DISCOVERY, e.to_string()).await;
            Err(e)
        }
    }
}
