//! # Route Modules
//!
//! | Path | Module |
//! |------|--------|
//! | `/` | service info (here) |
//! | `/request-types/*` | [`request_types`] |
//! | `/request-status-codes` | [`status_codes`] |
//! | `/requests/*` | [`requests`] |

pub mod request_types;
pub mod requests;
pub mod status_codes;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::{AppState, ServiceInfo};

/// Build the router for every API route.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .merge(request_types::router())
        .merge(status_codes::router())
        .merge(requests::router())
}

/// GET / — Describe the service.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo),
    ),
    tag = "service"
)]
pub(crate) async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.info.clone())
}
