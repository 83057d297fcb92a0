//! The storage port.
//!
//! Lookups return `Ok(None)` for a missing row; turning that into a
//! `NotFound` error is the registries' and [`RequestStore`](crate::RequestStore)'s
//! job. `Err` is reserved for driver failures (`Storage`) and writes the
//! backend refused (`Conflict`).

use adreq_core::{
    NewRequest, Request, RequestError, RequestFilter, RequestId, RequestSummary, RequestType,
    RequestTypeId, RequestTypeUpdate, StatusCode, StatusUpdate,
};
use async_trait::async_trait;

/// Transactional row store backing the request lifecycle.
#[async_trait]
pub trait Persistence: Send + Sync + std::fmt::Debug {
    /// Insert `candidate` unless a request type with the same name exists.
    ///
    /// Returns the stored row: `candidate` if it won, otherwise the row
    /// that was already there.
    async fn insert_request_type(&self, candidate: RequestType)
        -> Result<RequestType, RequestError>;

    /// Apply `update` to the named request type.
    async fn update_request_type(
        &self,
        name: &str,
        update: &RequestTypeUpdate,
    ) -> Result<Option<RequestType>, RequestError>;

    /// Look up a request type by exact name.
    async fn find_request_type(&self, name: &str) -> Result<Option<RequestType>, RequestError>;

    /// All request types, sorted by name.
    async fn list_request_types(&self) -> Result<Vec<RequestType>, RequestError>;

    /// Look up a status code by exact name.
    async fn find_status_code(&self, name: &str) -> Result<Option<StatusCode>, RequestError>;

    /// All status codes, sorted by name.
    async fn list_status_codes(&self) -> Result<Vec<StatusCode>, RequestError>;

    /// Persist a request together with its first status update.
    ///
    /// The first update is attributed to the requesting user.
    async fn create_request(
        &self,
        request: NewRequest,
        initial_status: &StatusCode,
    ) -> Result<Request, RequestError>;

    /// Append a status update. `Ok(None)` when the request does not exist.
    async fn append_status(
        &self,
        request_id: RequestId,
        status: &StatusCode,
        updating_user: &str,
        message: Option<&str>,
    ) -> Result<Option<StatusUpdate>, RequestError>;

    /// Load a request with its full history.
    async fn find_request(&self, request_id: RequestId) -> Result<Option<Request>, RequestError>;

    /// Summaries of the matching requests, newest first.
    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<RequestSummary>, RequestError>;

    /// Count a user's requests of one type. With `open_only`, requests whose
    /// current status completes them are not counted.
    async fn count_requests(
        &self,
        requesting_user: &str,
        request_type: RequestTypeId,
        open_only: bool,
    ) -> Result<u64, RequestError>;

    /// Check the backend can serve queries. Backends without a connection
    /// are always ready.
    async fn ping(&self) -> Result<(), RequestError> {
        Ok(())
    }
}
