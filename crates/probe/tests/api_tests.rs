//! Integration tests for the probe HTTP API

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use probe_lib::{
    api::{create_router, AppState},
    collector::{CollectionLoopBuilder, HostProbe, SampleError},
    discovery::{seed_services, DiscoveryError, DiscoverySettings},
    health::{components, HealthRegistry, UNHEALTHY_AFTER_FAILURES},
    models::{HostReading, HostSample, PortDescriptor, ServiceDescriptor},
    observability::StructuredLogger,
    store::SnapshotStore,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

fn fixed_sample(cpu: f64, mem: f64) -> HostSample {
    HostSample {
        cpu_percent: cpu,
        memory_percent: mem,
        sampled_at: chrono::Utc::now(),
    }
}

struct FixedProbe(Result<HostReading, SampleError>);

#[async_trait]
impl HostProbe for FixedProbe {
    async fn read(&self) -> Result<HostReading, SampleError> {
        self.0.clone()
    }
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::DISCOVERY).await;

    let state = Arc::new(AppState::new(SnapshotStore::default(), health_registry));
    let router = create_router(state.clone());

    (router, state)
}

async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, Method::GET, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_metrics_before_first_sample_returns_placeholder() {
    let (app, _state) = setup_test_app().await;

    let (status, snapshot) = get_json(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["cpu_usage_percent"], 0.0);
    assert_eq!(snapshot["memory_usage_percent"], 0.0);
    assert_eq!(snapshot["available_services"], serde_json::json!([]));
    assert!(snapshot["last_updated_utc"].is_string());
}

#[tokio::test]
async fn test_metrics_returns_latest_snapshot() {
    let (app, state) = setup_test_app().await;

    state.store.record_sample(&fixed_sample(37.46, 50.0)).await;
    state
        .store
        .replace_services(vec![ServiceDescriptor {
            name: "svc-y".to_string(),
            namespace: "team-a".to_string(),
            cluster_ip: "10.96.0.20".to_string(),
            ports: vec![PortDescriptor {
                name: "http".to_string(),
                port: 80,
                protocol: "TCP".to_string(),
                target_port: 8080,
            }],
            labels: BTreeMap::from([("app".to_string(), "svc-y".to_string())]),
        }])
        .await;

    let (status, snapshot) = get_json(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["cpu_usage_percent"], 37.46);
    assert_eq!(snapshot["memory_usage_percent"], 50.0);

    let service = &snapshot["available_services"][0];
    assert_eq!(service["name"], "svc-y");
    assert_eq!(service["cluster_ip"], "10.96.0.20");
    assert_eq!(service["labels"]["app"], "svc-y");
    assert_eq!(service["ports"][0]["target_port"], 8080);
    assert_eq!(service["ports"][0]["protocol"], "TCP");
}

#[tokio::test]
async fn test_metrics_content_type_is_json() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let content_type = response.headers().get("content-type").unwrap();
    assert_eq!(content_type.to_str().unwrap(), "application/json");
}

#[tokio::test]
async fn test_unknown_path_returns_404() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = send(app, Method::GET, "/nonexistent").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, b"Not Found");
}

#[tokio::test]
async fn test_wrong_method_returns_404() {
    let (app, _state) = setup_test_app().await;

    let (status, _) = send(app.clone(), Method::POST, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(app, Method::DELETE, "/healthz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_startup_sequence_serves_real_sample() {
    let (app, state) = setup_test_app().await;

    let mb = 1024 * 1024;
    let collection = CollectionLoopBuilder::new()
        .probe(Arc::new(FixedProbe(Ok(HostReading {
            cpu_percent: 37.456,
            memory_used_bytes: 512 * mb,
            memory_total_bytes: 1024 * mb,
        }))))
        .store(state.store.clone())
        .health(state.health_registry.clone())
        .build()
        .unwrap();

    let (status, _) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    assert!(collection.collect_once().await);
    state.health_registry.set_ready(true).await;

    let (status, _) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let (_, snapshot) = get_json(app, "/metrics").await;
    assert_eq!(snapshot["cpu_usage_percent"], 37.46);
    assert_eq!(snapshot["memory_usage_percent"], 50.0);
}

#[tokio::test]
async fn test_failed_sample_keeps_serving() {
    let (app, state) = setup_test_app().await;

    let collection = CollectionLoopBuilder::new()
        .probe(Arc::new(FixedProbe(Err(SampleError::Unavailable(
            "permission denied".to_string(),
        )))))
        .store(state.store.clone())
        .health(state.health_registry.clone())
        .build()
        .unwrap();

    assert!(!collection.collect_once().await);

    let (status, snapshot) = get_json(app.clone(), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["cpu_usage_percent"], 0.0);

    // Degraded still answers 200
    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["collector"]["status"], "degraded");
}

#[tokio::test]
async fn test_persistent_sample_failures_fail_liveness_only() {
    let (app, state) = setup_test_app().await;

    let collection = CollectionLoopBuilder::new()
        .probe(Arc::new(FixedProbe(Err(SampleError::Timeout(
            std::time::Duration::from_secs(5),
        )))))
        .store(state.store.clone())
        .health(state.health_registry.clone())
        .build()
        .unwrap();

    state.health_registry.set_ready(true).await;
    for _ in 0..UNHEALTHY_AFTER_FAILURES {
        assert!(!collection.collect_once().await);
    }

    let (status, health) = get_json(app.clone(), "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(
        health["components"]["collector"]["consecutive_failures"],
        UNHEALTHY_AFTER_FAILURES
    );

    let (status, _) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let (status, snapshot) = get_json(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["cpu_usage_percent"], 0.0);
}

#[tokio::test]
async fn test_missing_namespace_degrades_to_metrics_only() {
    let (app, state) = setup_test_app().await;
    let logger = StructuredLogger::new("svc-x");
    let settings = DiscoverySettings {
        self_name: Some("svc-x".to_string()),
        ..Default::default()
    };

    let err = seed_services(
        &state.store,
        &state.health_registry,
        &logger,
        Err(settings.validate().unwrap_err()),
        &settings,
    )
    .await
    .unwrap_err();
    assert_eq!(err, DiscoveryError::MissingNamespace);

    state.store.record_sample(&fixed_sample(12.0, 34.0)).await;
    state.health_registry.set_ready(true).await;

    let (status, snapshot) = get_json(app.clone(), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["cpu_usage_percent"], 12.0);
    assert_eq!(snapshot["available_services"], serde_json::json!([]));

    let (status, _) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let (_, health) = get_json(app, "/healthz").await;
    assert_eq!(health["components"]["discovery"]["status"], "degraded");
}

#[tokio::test]
async fn test_prometheus_endpoint_exposes_probe_metrics() {
    let (app, state) = setup_test_app().await;

    let collection = CollectionLoopBuilder::new()
        .probe(Arc::new(FixedProbe(Ok(HostReading {
            cpu_percent: 5.0,
            memory_used_bytes: 1,
            memory_total_bytes: 4,
        }))))
        .store(state.store.clone())
        .build()
        .unwrap();
    assert!(collection.collect_once().await);

    let (status, body) = send(app, Method::GET, "/metrics/prometheus").await;
    let text = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("service_probe_sample_latency_seconds_bucket"));
    assert!(text.contains("service_probe_cpu_usage_percent"));
    assert!(text.contains("service_probe_memory_usage_percent"));
}
