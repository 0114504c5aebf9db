//! Health and readiness tracking for the probe
//!
//! The collector and discovery components report each success or failure
//! here. A component that keeps failing is escalated from degraded to
//! unhealthy; `/healthz` then answers 503 so the kubelet restarts the
//! sidecar. Readiness only tracks whether startup has taken its first
//! sample, because a sidecar's readiness gates the whole pod.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Failures in a row after which a component is reported unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but the last operation failed
    Degraded,
    /// Failed [`UNHEALTHY_AFTER_FAILURES`] times in a row
    Unhealthy,
}

impl ComponentStatus {
    fn for_failure_streak(failures: u32) -> Self {
        match failures {
            0 => ComponentStatus::Healthy,
            n if n < UNHEALTHY_AFTER_FAILURES => ComponentStatus::Degraded,
            _ => ComponentStatus::Unhealthy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    /// Last error, kept until the next success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_streak(consecutive_failures: u32, last_error: Option<String>) -> Self {
        Self {
            status: ComponentStatus::for_failure_streak(consecutive_failures),
            last_error,
            consecutive_failures,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_streak(0, None)
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components wins
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max_by_key(|status| match status {
                ComponentStatus::Healthy => 0,
                ComponentStatus::Degraded => 1,
                ComponentStatus::Unhealthy => 2,
            })
            .unwrap_or(ComponentStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const COLLECTOR: &str = "collector";
    pub const DISCOVERY: &str = "discovery";
}

/// Health registry shared between the background tasks and the HTTP layer
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.set_healthy(name).await;
    }

    /// Record a success; clears the failure streak
    pub async fn set_healthy(&self, name: &str) {
        self.components
            .write()
            .await
            .insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Record a failure and return the component's resulting status
    pub async fn record_failure(&self, name: &str, error: impl Into<String>) -> ComponentStatus {
        let mut components = self.components.write().await;
        let streak = components
            .get(name)
            .map_or(0, |c| c.consecutive_failures)
            .saturating_add(1);

        let health = ComponentHealth::with_streak(streak, Some(error.into()));
        let status = health.status;
        components.insert(name.to_string(), health);
        status
    }

    /// Flipped once startup has taken its first sample
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        if *self.ready.read().await {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessResponse {
                ready: false,
                reason: Some("Initial metrics collection not finished".to_string()),
            }
        }
    }
}
