//! Service probe - host metrics and service discovery sidecar
//!
//! Samples host CPU and memory every few seconds, discovers sibling
//! services once at startup and serves both as JSON at `/metrics`.

use anyhow::{Context, Result};
use probe_lib::{
    api::{self, AppState},
    collector::{CollectionLoopBuilder, SysinfoProbe},
    discovery::{seed_services, KubeServiceSource, ServiceSource},
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    store::SnapshotStore,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const PROBE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting service-probe");

    let config = config::ProbeConfig::load()?;
    info!(
        port = config.port,
        namespace = config.namespace.as_deref().unwrap_or(""),
        interval_secs = config.collection_interval_secs,
        "Probe configured"
    );

    let logger = StructuredLogger::new(
        config
            .service_name
            .clone()
            .unwrap_or_else(|| "service-probe".to_string()),
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::DISCOVERY).await;

    let store = SnapshotStore::new(config.my_pod_name.clone());

    // Discovery runs once; any failure leaves us serving metrics only
    let discovery = config.discovery();
    let source = discovery
        .validate()
        .and_then(|_| KubeServiceSource::in_cluster());
    // seed_services logs the failure and marks discovery degraded itself
    let _ = seed_services(
        &store,
        &health_registry,
        &logger,
        source
            .as_ref()
            .map(|s| s as &dyn ServiceSource)
            .map_err(|e| e.clone()),
        &discovery,
    )
    .await;

    let collection = CollectionLoopBuilder::new()
        .probe(Arc::new(SysinfoProbe::new()))
        .store(store.clone())
        .health(health_registry.clone())
        .logger(logger.clone())
        .interval(config.collection().interval)
        .sample_timeout(config.collection().sample_timeout)
        .build()
        .context("Failed to build collection loop")?;

    info!("Performing initial metrics collection");
    if !collection.collect_once().await {
        warn!("Initial metrics collection failed, serving placeholder until the next cycle");
    }
    health_registry.set_ready(true).await;

    let (shutdown_tx, _) = broadcast::channel(1);
    let loop_handle = tokio::spawn(collection.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(AppState::new(store, health_registry));
    let mut api_handle = tokio::spawn(api::serve(
        config.port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    logger.log_startup(PROBE_VERSION, config.port);

    let api_exit = tokio::select! {
        reason = shutdown_signal() => {
            logger.log_shutdown(reason);
            None
        }
        result = &mut api_handle => Some(result),
    };

    let _ = shutdown_tx.send(());
    loop_handle.await?;

    match api_exit {
        None => api_handle.await??,
        Some(result) => result?.context("API server exited unexpectedly")?,
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT received",
        _ = terminate => "SIGTERM received",
    }
}
