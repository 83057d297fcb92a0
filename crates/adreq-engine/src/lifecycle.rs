//! # Request Lifecycle
//!
//! Entry point for every operation on requests. Write operations follow
//! one sequence:
//!
//! 1. Validate input and resolve reference data. Any failure here is
//!    returned before anything is written.
//! 2. Commit through [`RequestStore`].
//! 3. Dispatch notifications for the committed update.
//!
//! Dispatch runs on its own Tokio task. If the caller's future is dropped
//! after the commit, notifications already in flight still complete.
//!
//! States are open-ended: a request is in whichever status its latest
//! update carries, and any registered status may follow any other.

use std::sync::Arc;

use adreq_core::model::MAX_USERNAME_LEN;
use adreq_core::{
    Request, RequestError, RequestFilter, RequestId, RequestSummary, RequestType,
    RequestTypeUpdate, StatusCode, StatusUpdate,
};
use adreq_store::{Persistence, RequestStore, RequestTypeRegistry, StatusCodeRegistry};

use crate::dispatcher::{DispatchResult, NotificationDispatcher};

/// Status assigned to new requests unless configured otherwise.
pub const DEFAULT_INITIAL_STATUS: &str = "submitted";

/// A committed value together with the outcome of its notifications.
#[derive(Debug, Clone)]
pub struct Dispatched<T> {
    pub value: T,
    pub dispatch: DispatchResult,
}

impl<T> Dispatched<T> {
    /// Non-fatal notification failures, one message per failed attempt.
    pub fn warnings(&self) -> Vec<String> {
        self.dispatch
            .failures
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Orchestrates submission and status transitions.
#[derive(Debug, Clone)]
pub struct RequestLifecycleManager {
    request_types: RequestTypeRegistry,
    status_codes: StatusCodeRegistry,
    requests: RequestStore,
    dispatcher: Arc<NotificationDispatcher>,
    initial_status: String,
}

impl RequestLifecycleManager {
    pub fn new(store: Arc<dyn Persistence>, dispatcher: NotificationDispatcher) -> Self {
        Self {
            request_types: RequestTypeRegistry::new(store.clone()),
            status_codes: StatusCodeRegistry::new(store.clone()),
            requests: RequestStore::new(store),
            dispatcher: Arc::new(dispatcher),
            initial_status: DEFAULT_INITIAL_STATUS.to_string(),
        }
    }

    /// Use `status` for new requests instead of [`DEFAULT_INITIAL_STATUS`].
    pub fn with_initial_status(mut self, status: impl Into<String>) -> Self {
        self.initial_status = status.into();
        self
    }

    pub fn initial_status(&self) -> &str {
        &self.initial_status
    }

    /// Submit a new request of type `type_name` on behalf of `user`.
    pub async fn submit_request(
        &self,
        user: &str,
        type_name: &str,
        details: serde_json::Value,
    ) -> Result<Dispatched<Request>, RequestError> {
        require_user(user)?;
        if !details.is_object() {
            return Err(RequestError::ValidationFailed(
                "request details must be a JSON object".into(),
            ));
        }

        let request_type = self.request_types.get(type_name).await?;
        self.enforce_limits(user, &request_type).await?;
        let initial = self.status_codes.get(&self.initial_status).await?;

        let request = self
            .requests
            .create_request(user, request_type, details, &initial)
            .await?;
        let first = request.updates.first().cloned().ok_or_else(|| {
            RequestError::Storage(format!("request {} was stored without a status", request.id))
        })?;
        count_update(&initial);

        let dispatch = self.dispatch(request.clone(), first).await;
        Ok(Dispatched {
            value: request,
            dispatch,
        })
    }

    /// Move a request to `status_name`.
    pub async fn update_status(
        &self,
        request_id: RequestId,
        status_name: &str,
        updating_user: &str,
        message: Option<&str>,
    ) -> Result<Dispatched<StatusUpdate>, RequestError> {
        require_user(updating_user)?;
        let status = self.status_codes.get(status_name).await?;
        let request = self.requests.get_request(request_id).await?;

        let update = self
            .requests
            .append_status(request_id, &status, updating_user, message)
            .await?;
        count_update(&status);

        let dispatch = self.dispatch(request, update.clone()).await;
        Ok(Dispatched {
            value: update,
            dispatch,
        })
    }

    pub async fn list_request_types(&self) -> Result<Vec<RequestType>, RequestError> {
        self.request_types.list().await
    }

    pub async fn get_request_type(&self, name: &str) -> Result<RequestType, RequestError> {
        self.request_types.get(name).await
    }

    pub async fn register_request_type(&self, name: &str) -> Result<RequestType, RequestError> {
        self.request_types.register(name).await
    }

    pub async fn update_request_type(
        &self,
        name: &str,
        update: RequestTypeUpdate,
    ) -> Result<RequestType, RequestError> {
        self.request_types.update(name, update).await
    }

    pub async fn list_status_codes(&self) -> Result<Vec<StatusCode>, RequestError> {
        self.status_codes.list().await
    }

    pub async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<RequestSummary>, RequestError> {
        self.requests.list_requests(filter).await
    }

    pub async fn get_request(&self, request_id: RequestId) -> Result<Request, RequestError> {
        self.requests.get_request(request_id).await
    }

    async fn enforce_limits(
        &self,
        user: &str,
        request_type: &RequestType,
    ) -> Result<(), RequestError> {
        let limits = [
            ("total", request_type.maximum_requests_per_user, false),
            (
                "concurrent",
                request_type.maximum_concurrent_requests_per_user,
                true,
            ),
        ];
        for (scope, limit, open_only) in limits {
            let Some(limit) = limit else {
                continue;
            };
            let existing = self
                .requests
                .count_requests(user, request_type.id, open_only)
                .await?;
            if existing >= u64::try_from(limit).unwrap_or(0) {
                tracing::info!(
                    user,
                    request_type = %request_type.name,
                    scope,
                    limit,
                    existing,
                    "request limit reached"
                );
                return Err(RequestError::LimitExceeded {
                    user: user.to_string(),
                    request_type: request_type.name.clone(),
                    scope,
                    limit,
                });
            }
        }
        Ok(())
    }

    async fn dispatch(&self, request: Request, update: StatusUpdate) -> DispatchResult {
        let dispatcher = Arc::clone(&self.dispatcher);
        let request_id = request.id;
        let sequence = update.sequence;
        let task = tokio::spawn(async move { dispatcher.dispatch(&request, &update).await });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    sequence,
                    error = %e,
                    "notification dispatch task failed"
                );
                DispatchResult::aborted(e.to_string())
            }
        }
    }
}

fn require_user(user: &str) -> Result<(), RequestError> {
    if user.trim().is_empty() {
        return Err(RequestError::ValidationFailed("user must not be blank".into()));
    }
    let len = user.chars().count();
    if len > MAX_USERNAME_LEN {
        return Err(RequestError::ValidationFailed(format!(
            "user is {len} characters, the maximum is {MAX_USERNAME_LEN}"
        )));
    }
    Ok(())
}

fn count_update(status: &StatusCode) {
    metrics::counter!("adreq_status_updates_total", "status" => status.name.clone()).increment(1);
}
