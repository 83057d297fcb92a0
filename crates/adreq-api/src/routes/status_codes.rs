//! # Status Code API
//!
//! Status codes are seeded reference data; this surface is read-only.

use adreq_core::StatusCode;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// A status a request can be in.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCodeView {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub email_template: String,
    /// Whether reaching this status closes the request.
    pub completes_request: bool,
}

impl From<StatusCode> for StatusCodeView {
    fn from(code: StatusCode) -> Self {
        Self {
            id: *code.id.as_uuid(),
            name: code.name,
            display_name: code.display_name,
            email_template: code.email_template,
            completes_request: code.completes_request,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCodeListing {
    pub status_codes: Vec<StatusCodeView>,
}

/// Build the status codes router.
pub fn router() -> Router<AppState> {
    Router::new().route("/request-status-codes", get(list_status_codes))
}

/// GET /request-status-codes — List status codes.
#[utoipa::path(
    get,
    path = "/request-status-codes",
    responses(
        (status = 200, description = "All status codes, sorted by name", body = StatusCodeListing),
    ),
    tag = "status_codes"
)]
pub(crate) async fn list_status_codes(
    State(state): State<AppState>,
) -> Result<Json<StatusCodeListing>, AppError> {
    let codes = state.lifecycle.list_status_codes().await?;
    Ok(Json(StatusCodeListing {
        status_codes: codes.into_iter().map(StatusCodeView::from).collect(),
    }))
}
