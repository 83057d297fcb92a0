//! # adreq-api — Administrative Requests HTTP Service
//!
//! Axum surface over the request lifecycle engine.
//!
//! ## Routes
//!
//! - `/`: service information
//! - `/request-types/*`: registration, lookup and per-user limits
//! - `/request-status-codes`: seeded status codes
//! - `/requests/*`: submission, listing, lookup and status updates
//! - `/openapi.json`: generated OpenAPI document
//! - `/metrics`: Prometheus scrape
//! - `/health/*`: liveness and readiness probes
//!
//! ## Crate Policy
//!
//! - No business logic in route handlers. Handlers delegate to
//!   [`adreq_engine::RequestLifecycleManager`].
//! - All errors map to structured HTTP responses via [`AppError`].

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .merge(openapi::router())
        .route("/metrics", get(metrics))
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — 200 once the backing store answers.
async fn readiness(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => "ready".into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable").into_response()
        }
    }
}

/// Prometheus text exposition.
async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
