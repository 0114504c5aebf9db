//! Service registry client backed by the Kubernetes API

use super::{DiscoveryError, ServiceSource};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::api::ListParams;
use kube::{Api, Client, Config};
use tracing::{debug, info};

/// Lists services through the API server using in-cluster credentials
#[derive(Clone)]
pub struct KubeServiceSource {
    client: Client,
}

impl KubeServiceSource {
    /// Build a client from the pod's service account
    ///
    /// Fails with [`DiscoveryError::NotInCluster`] when the service account
    /// token or the `KUBERNETES_SERVICE_*` environment is missing.
    pub fn in_cluster() -> Result<Self, DiscoveryError> {
        let config =
            Config::incluster().map_err(|e| DiscoveryError::NotInCluster(e.to_string()))?;
        info!(cluster_url = %config.cluster_url, "Using in-cluster Kubernetes config");

        let client = Client::try_from(config)
            .map_err(|e| DiscoveryError::QueryFailed(format!("failed to build client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ServiceSource for KubeServiceSource {
    async fn list_services(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Service>, DiscoveryError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);

        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }

        let list = api.list(&params).await.map_err(|e| {
            DiscoveryError::QueryFailed(format!("namespace {namespace}: {e}"))
        })?;

        debug!(namespace = %namespace, count = list.items.len(), "Listed services");
        Ok(list.items)
    }
}
