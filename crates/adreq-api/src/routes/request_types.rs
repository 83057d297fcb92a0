//! # Request Type API
//!
//! Registration, lookup and limit updates for request types. Registration
//! is idempotent: posting an existing name returns the stored record.

use adreq_core::{RequestType, RequestTypeUpdate};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{double_option, extract_validated_json, Validate};
use crate::state::AppState;

/// A registered request type.
#[derive(Debug, Serialize, ToSchema)]
pub struct RequestTypeView {
    pub id: Uuid,
    pub name: String,
    /// Most requests of this type one user may ever submit.
    pub maximum_requests_per_user: Option<i32>,
    /// Most open requests of this type one user may have at once.
    pub maximum_concurrent_requests_per_user: Option<i32>,
}

impl From<RequestType> for RequestTypeView {
    fn from(rt: RequestType) -> Self {
        Self {
            id: *rt.id.as_uuid(),
            name: rt.name,
            maximum_requests_per_user: rt.maximum_requests_per_user,
            maximum_concurrent_requests_per_user: rt.maximum_concurrent_requests_per_user,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestTypeListing {
    pub request_types: Vec<RequestTypeView>,
}

/// Limit changes. An absent field is left alone; `null` removes the limit.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateRequestTypeRequest {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub maximum_requests_per_user: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub maximum_concurrent_requests_per_user: Option<Option<i32>>,
}

impl UpdateRequestTypeRequest {
    fn into_update(self) -> RequestTypeUpdate {
        RequestTypeUpdate {
            maximum_requests_per_user: self.maximum_requests_per_user,
            maximum_concurrent_requests_per_user: self.maximum_concurrent_requests_per_user,
        }
    }
}

impl Validate for UpdateRequestTypeRequest {
    fn validate(&self) -> Result<(), String> {
        RequestTypeUpdate {
            maximum_requests_per_user: self.maximum_requests_per_user,
            maximum_concurrent_requests_per_user: self.maximum_concurrent_requests_per_user,
        }
        .validate()
    }
}

/// Build the request types router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/request-types", get(list_request_types))
        .route(
            "/request-types/{name}",
            get(get_request_type)
                .post(register_request_type)
                .patch(update_request_type),
        )
}

/// GET /request-types — List request types.
#[utoipa::path(
    get,
    path = "/request-types",
    responses(
        (status = 200, description = "All request types, sorted by name", body = RequestTypeListing),
    ),
    tag = "request_types"
)]
pub(crate) async fn list_request_types(
    State(state): State<AppState>,
) -> Result<Json<RequestTypeListing>, AppError> {
    let types = state.lifecycle.list_request_types().await?;
    Ok(Json(RequestTypeListing {
        request_types: types.into_iter().map(RequestTypeView::from).collect(),
    }))
}

/// GET /request-types/{name} — Get a request type.
#[utoipa::path(
    get,
    path = "/request-types/{name}",
    params(("name" = String, Path, description = "Request type name")),
    responses(
        (status = 200, description = "Request type found", body = RequestTypeView),
        (status = 404, description = "Not registered", body = crate::error::ErrorBody),
    ),
    tag = "request_types"
)]
pub(crate) async fn get_request_type(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RequestTypeView>, AppError> {
    let rt = state.lifecycle.get_request_type(&name).await?;
    Ok(Json(rt.into()))
}

/// POST /request-types/{name} — Register a request type.
#[utoipa::path(
    post,
    path = "/request-types/{name}",
    params(("name" = String, Path, description = "Request type name")),
    responses(
        (status = 200, description = "Registered, or already registered", body = RequestTypeView),
        (status = 422, description = "Invalid name", body = crate::error::ErrorBody),
    ),
    tag = "request_types"
)]
pub(crate) async fn register_request_type(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RequestTypeView>, AppError> {
    let rt = state.lifecycle.register_request_type(&name).await?;
    Ok(Json(rt.into()))
}

/// PATCH /request-types/{name} — Update a request type's limits.
#[utoipa::path(
    patch,
    path = "/request-types/{name}",
    params(("name" = String, Path, description = "Request type name")),
    request_body = UpdateRequestTypeRequest,
    responses(
        (status = 200, description = "Updated", body = RequestTypeView),
        (status = 404, description = "Not registered", body = crate::error::ErrorBody),
        (status = 422, description = "Negative limit", body = crate::error::ErrorBody),
    ),
    tag = "request_types"
)]
pub(crate) async fn update_request_type(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<UpdateRequestTypeRequest>, JsonRejection>,
) -> Result<Json<RequestTypeView>, AppError> {
    let req = extract_validated_json(body)?;
    let rt = state
        .lifecycle
        .update_request_type(&name, req.into_update())
        .await?;
    Ok(Json(rt.into()))
}
