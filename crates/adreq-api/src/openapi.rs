//! # OpenAPI Specification Assembly
//!
//! Assembles every utoipa-documented route into a single OpenAPI 3.1
//! document, served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "DE Administrative Requests API",
        description = "Request types, status codes, request submission and status updates, with notifications to requesters and administrators."
    ),
    paths(
        crate::routes::service_info,
        // Request types
        crate::routes::request_types::list_request_types,
        crate::routes::request_types::get_request_type,
        crate::routes::request_types::register_request_type,
        crate::routes::request_types::update_request_type,
        // Status codes
        crate::routes::status_codes::list_status_codes,
        // Requests
        crate::routes::requests::list_requests,
        crate::routes::requests::submit_request,
        crate::routes::requests::get_request,
        crate::routes::requests::update_status,
    ),
    components(schemas(
        crate::state::ServiceInfo,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::request_types::RequestTypeView,
        crate::routes::request_types::RequestTypeListing,
        crate::routes::request_types::UpdateRequestTypeRequest,
        crate::routes::status_codes::StatusCodeView,
        crate::routes::status_codes::StatusCodeListing,
        crate::routes::requests::SubmitRequestBody,
        crate::routes::requests::StatusChangeBody,
        crate::routes::requests::StatusUpdateView,
        crate::routes::requests::RequestSummaryView,
        crate::routes::requests::RequestListing,
        crate::routes::requests::RequestView,
        crate::routes::requests::SubmitResponse,
        crate::routes::requests::StatusUpdateResponse,
    )),
    tags(
        (name = "service", description = "Service information"),
        (name = "request_types", description = "Request type registration and limits"),
        (name = "status_codes", description = "Request status codes"),
        (name = "requests", description = "Request submission, lookup and status updates"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
