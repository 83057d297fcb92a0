//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor. Cloning is cheap: every field is an `Arc` or
//! wraps one.

use std::sync::Arc;

use adreq_engine::RequestLifecycleManager;
use adreq_store::Persistence;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use utoipa::ToSchema;

/// Service description returned by `GET /`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceInfo {
    pub service: String,
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "requests".to_string(),
            title: "DE Administrative Requests API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Tracks administrative requests and notifies requesters and \
                          administrators of status changes."
                .to_string(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: RequestLifecycleManager,
    /// Backing store, for readiness checks.
    pub store: Arc<dyn Persistence>,
    pub info: ServiceInfo,
    /// Renders the Prometheus scrape. `None` when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("lifecycle", &self.lifecycle)
            .field("store", &self.store)
            .field("info", &self.info)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(lifecycle: RequestLifecycleManager, store: Arc<dyn Persistence>) -> Self {
        Self {
            lifecycle,
            store,
            info: ServiceInfo::default(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
