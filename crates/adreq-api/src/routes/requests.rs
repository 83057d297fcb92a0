//! # Requests API
//!
//! Submission, listing, lookup and status transitions. Write endpoints
//! name the acting user with `?user=`.
//!
//! A write that commits but whose notifications partly fail still
//! succeeds. The failed attempts are listed in `notification_warnings`.

use adreq_core::{Request, RequestFilter, RequestSummary, StatusUpdate};
use adreq_engine::Dispatched;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, parse_request_id, UserParam, Validate};
use crate::state::AppState;

// -- Query parameters ---------------------------------------------------------

/// Listing filters. Every parameter is optional.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RequestListQuery {
    /// Only requests submitted by this user.
    #[serde(rename = "requesting-user")]
    pub requesting_user: Option<String>,
    /// Only requests of this type.
    #[serde(rename = "request-type")]
    pub request_type: Option<String>,
    /// Only requests whose current status has this name.
    pub status: Option<String>,
    /// `false` hides requests in a completing status.
    #[serde(rename = "include-completed")]
    pub include_completed: Option<bool>,
}

impl From<RequestListQuery> for RequestFilter {
    fn from(q: RequestListQuery) -> Self {
        Self {
            requesting_user: q.requesting_user,
            status: q.status,
            request_type: q.request_type,
            include_completed: q.include_completed,
        }
    }
}

// -- Bodies -------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequestBody {
    /// Name of a registered request type.
    pub request_type: String,
    /// Free-form JSON object stored with the request.
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
}

impl Validate for SubmitRequestBody {
    fn validate(&self) -> Result<(), String> {
        if self.request_type.trim().is_empty() {
            return Err("request_type must not be empty".to_string());
        }
        if !self.details.is_object() {
            return Err("details must be a JSON object".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChangeBody {
    /// Name of the status to move to.
    pub status: String,
    pub message: Option<String>,
}

impl Validate for StatusChangeBody {
    fn validate(&self) -> Result<(), String> {
        if self.status.trim().is_empty() {
            return Err("status must not be empty".to_string());
        }
        Ok(())
    }
}

// -- Views --------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusUpdateView {
    pub id: Uuid,
    pub sequence: i64,
    pub status: String,
    pub status_display_name: String,
    pub completes_request: bool,
    pub updating_user: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StatusUpdate> for StatusUpdateView {
    fn from(u: StatusUpdate) -> Self {
        Self {
            id: *u.id.as_uuid(),
            sequence: u.sequence,
            status: u.status.name,
            status_display_name: u.status.display_name,
            completes_request: u.status.completes_request,
            updating_user: u.updating_user,
            message: u.message,
            created_at: u.created_at,
        }
    }
}

/// A request with its current status only.
#[derive(Debug, Serialize, ToSchema)]
pub struct RequestSummaryView {
    pub id: Uuid,
    pub requesting_user: String,
    pub request_type: String,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub status: StatusUpdateView,
}

impl From<RequestSummary> for RequestSummaryView {
    fn from(s: RequestSummary) -> Self {
        Self {
            id: *s.id.as_uuid(),
            requesting_user: s.requesting_user,
            request_type: s.request_type.name,
            details: s.details,
            created_at: s.created_at,
            status: s.current.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestListing {
    pub requests: Vec<RequestSummaryView>,
}

/// A request with its full status history, oldest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct RequestView {
    pub id: Uuid,
    pub requesting_user: String,
    pub request_type: String,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updates: Vec<StatusUpdateView>,
}

impl From<Request> for RequestView {
    fn from(r: Request) -> Self {
        Self {
            id: *r.id.as_uuid(),
            requesting_user: r.requesting_user,
            request_type: r.request_type.name,
            details: r.details,
            created_at: r.created_at,
            updates: r.updates.into_iter().map(StatusUpdateView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    #[serde(flatten)]
    pub request: RequestView,
    /// Notification attempts that failed. The request was still stored.
    pub notification_warnings: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusUpdateResponse {
    #[serde(flatten)]
    pub update: StatusUpdateView,
    /// Notification attempts that failed. The update was still stored.
    pub notification_warnings: Vec<String>,
}

fn with_warnings<T, V>(dispatched: Dispatched<T>) -> (V, Vec<String>)
where
    V: From<T>,
{
    let warnings = dispatched.warnings();
    (V::from(dispatched.into_inner()), warnings)
}

fn acting_user(query: Result<Query<UserParam>, QueryRejection>) -> Result<String, AppError> {
    let param = extract_query(query)?;
    param.validate().map_err(AppError::Validation)?;
    Ok(param.user)
}

// -- Handlers -----------------------------------------------------------------

/// Build the requests router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/requests", get(list_requests).post(submit_request))
        .route("/requests/{id}", get(get_request))
        .route("/requests/{id}/status", post(update_status))
}

/// GET /requests — List requests, newest first.
#[utoipa::path(
    get,
    path = "/requests",
    params(RequestListQuery),
    responses(
        (status = 200, description = "Matching requests", body = RequestListing),
        (status = 400, description = "Malformed query", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn list_requests(
    State(state): State<AppState>,
    query: Result<Query<RequestListQuery>, QueryRejection>,
) -> Result<Json<RequestListing>, AppError> {
    let filter = RequestFilter::from(extract_query(query)?);
    let summaries = state.lifecycle.list_requests(&filter).await?;
    Ok(Json(RequestListing {
        requests: summaries.into_iter().map(RequestSummaryView::from).collect(),
    }))
}

/// POST /requests — Submit a request.
#[utoipa::path(
    post,
    path = "/requests",
    params(UserParam),
    request_body = SubmitRequestBody,
    responses(
        (status = 200, description = "Request stored and notifications sent", body = SubmitResponse),
        (status = 404, description = "Unknown request type or initial status", body = crate::error::ErrorBody),
        (status = 409, description = "Per-user limit reached", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid input", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn submit_request(
    State(state): State<AppState>,
    user: Result<Query<UserParam>, QueryRejection>,
    body: Result<Json<SubmitRequestBody>, JsonRejection>,
) -> Result<Json<SubmitResponse>, AppError> {
    let user = acting_user(user)?;
    let body = extract_json(body)?;
    body.validate().map_err(AppError::Validation)?;

    let dispatched = state
        .lifecycle
        .submit_request(&user, &body.request_type, body.details)
        .await?;
    let (request, notification_warnings) = with_warnings(dispatched);
    Ok(Json(SubmitResponse {
        request,
        notification_warnings,
    }))
}

/// GET /requests/{id} — Get a request with its history.
#[utoipa::path(
    get,
    path = "/requests/{id}",
    params(("id" = Uuid, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request found", body = RequestView),
        (status = 400, description = "Malformed id", body = crate::error::ErrorBody),
        (status = 404, description = "No such request", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RequestView>, AppError> {
    let id = parse_request_id(&id)?;
    let request = state.lifecycle.get_request(id).await?;
    Ok(Json(request.into()))
}

/// POST /requests/{id}/status — Move a request to a new status.
#[utoipa::path(
    post,
    path = "/requests/{id}/status",
    params(("id" = Uuid, Path, description = "Request id"), UserParam),
    request_body = StatusChangeBody,
    responses(
        (status = 200, description = "Update stored and notifications sent", body = StatusUpdateResponse),
        (status = 404, description = "Unknown request or status", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid input", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: Result<Query<UserParam>, QueryRejection>,
    body: Result<Json<StatusChangeBody>, JsonRejection>,
) -> Result<Json<StatusUpdateResponse>, AppError> {
    let id = parse_request_id(&id)?;
    let user = acting_user(user)?;
    let body = extract_json(body)?;
    body.validate().map_err(AppError::Validation)?;

    let dispatched = state
        .lifecycle
        .update_status(id, &body.status, &user, body.message.as_deref())
        .await?;
    let (update, notification_warnings) = with_warnings(dispatched);
    Ok(Json(StatusUpdateResponse {
        update,
        notification_warnings,
    }))
}
