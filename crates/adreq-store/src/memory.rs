//! # In-Memory Backend
//!
//! Thread-safe, cloneable [`Persistence`] implementation over in-process
//! maps. All clones share the same data. Suitable for development and
//! tests; nothing survives a restart.
//!
//! A single `parking_lot::RwLock` guards every table, so each write is
//! trivially atomic and appends to one request are serialized. The lock is
//! never held across an `.await` point. `parking_lot` locks are
//! non-poisoning: a panicking writer does not permanently wedge the store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use adreq_core::{
    NewRequest, Request, RequestError, RequestFilter, RequestId, RequestSummary, RequestType,
    RequestTypeId, RequestTypeUpdate, StatusCode, StatusUpdate,
};
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::persistence::Persistence;

#[derive(Debug, Default)]
struct Tables {
    request_types: BTreeMap<String, RequestType>,
    status_codes: BTreeMap<String, StatusCode>,
    requests: HashMap<RequestId, Request>,
}

/// In-memory store. Cheaply cloneable via `Arc`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create an empty store with no status codes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with [`default_status_codes`](crate::default_status_codes).
    pub fn with_default_status_codes() -> Self {
        let store = Self::new();
        for code in crate::default_status_codes() {
            store.put_status_code(code);
        }
        store
    }

    /// Insert or replace a status code. Status codes are reference data
    /// managed outside the lifecycle, so this is not part of [`Persistence`].
    pub fn put_status_code(&self, code: StatusCode) {
        self.tables
            .write()
            .status_codes
            .insert(code.name.clone(), code);
    }

    /// Number of stored requests.
    pub fn request_count(&self) -> usize {
        self.tables.read().requests.len()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn insert_request_type(
        &self,
        candidate: RequestType,
    ) -> Result<RequestType, RequestError> {
        let mut tables = self.tables.write();
        let stored = tables
            .request_types
            .entry(candidate.name.clone())
            .or_insert(candidate);
        Ok(stored.clone())
    }

    async fn update_request_type(
        &self,
        name: &str,
        update: &RequestTypeUpdate,
    ) -> Result<Option<RequestType>, RequestError> {
        let mut tables = self.tables.write();
        let Some(request_type) = tables.request_types.get_mut(name) else {
            return Ok(None);
        };
        request_type.apply(update);
        let updated = request_type.clone();

        // Requests embed their type; keep those copies in step.
        for request in tables.requests.values_mut() {
            if request.request_type.id == updated.id {
                request.request_type = updated.clone();
            }
        }
        Ok(Some(updated))
    }

    async fn find_request_type(&self, name: &str) -> Result<Option<RequestType>, RequestError> {
        Ok(self.tables.read().request_types.get(name).cloned())
    }

    async fn list_request_types(&self) -> Result<Vec<RequestType>, RequestError> {
        Ok(self.tables.read().request_types.values().cloned().collect())
    }

    async fn find_status_code(&self, name: &str) -> Result<Option<StatusCode>, RequestError> {
        Ok(self.tables.read().status_codes.get(name).cloned())
    }

    async fn list_status_codes(&self) -> Result<Vec<StatusCode>, RequestError> {
        Ok(self.tables.read().status_codes.values().cloned().collect())
    }

    async fn create_request(
        &self,
        request: NewRequest,
        initial_status: &StatusCode,
    ) -> Result<Request, RequestError> {
        let id = RequestId::new();
        let now = crate::now();
        let first = crate::next_update(
            id,
            None,
            initial_status,
            &request.requesting_user,
            None,
            now,
        );
        let record = Request {
            id,
            requesting_user: request.requesting_user,
            request_type: request.request_type,
            details: request.details,
            created_at: now,
            updates: vec![first],
        };

        let mut tables = self.tables.write();
        if tables.requests.contains_key(&id) {
            return Err(RequestError::Conflict(format!("request {id} already exists")));
        }
        tables.requests.insert(id, record.clone());
        Ok(record)
    }

    async fn append_status(
        &self,
        request_id: RequestId,
        status: &StatusCode,
        updating_user: &str,
        message: Option<&str>,
    ) -> Result<Option<StatusUpdate>, RequestError> {
        let mut tables = self.tables.write();
        let Some(request) = tables.requests.get_mut(&request_id) else {
            return Ok(None);
        };
        let latest = request.updates.last().map(|u| (u.sequence, u.created_at));
        let update = crate::next_update(
            request_id,
            latest,
            status,
            updating_user,
            message,
            crate::now(),
        );
        request.updates.push(update.clone());
        Ok(Some(update))
    }

    async fn find_request(&self, request_id: RequestId) -> Result<Option<Request>, RequestError> {
        Ok(self.tables.read().requests.get(&request_id).cloned())
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<RequestSummary>, RequestError> {
        let mut summaries: Vec<RequestSummary> = self
            .tables
            .read()
            .requests
            .values()
            .filter_map(Request::summary)
            .filter(|s| filter.matches(s))
            .collect();
        summaries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(summaries)
    }

    async fn count_requests(
        &self,
        requesting_user: &str,
        request_type: RequestTypeId,
        open_only: bool,
    ) -> Result<u64, RequestError> {
        let count = self
            .tables
            .read()
            .requests
            .values()
            .filter(|r| r.requesting_user == requesting_user && r.request_type.id == request_type)
            .filter(|r| {
                !open_only
                    || r
                        .current()
                        .map_or(true, |current| !current.status.completes_request)
            })
            .count();
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_request(user: &str, request_type: RequestType) -> NewRequest {
        NewRequest {
            requesting_user: user.into(),
            request_type,
            details: serde_json::json!({"reason": "testing"}),
        }
    }

    #[tokio::test]
    async fn duplicate_insert_keeps_first_writer() {
        let store = MemoryStore::new();
        let first = store
            .insert_request_type(RequestType::new("vice"))
            .await
            .unwrap();
        let second = store
            .insert_request_type(RequestType::new("vice"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_request_types().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_request_types_is_sorted_by_name() {
        let store = MemoryStore::new();
        for name in ["vice", "account-removal", "data-quota"] {
            store.insert_request_type(RequestType::new(name)).await.unwrap();
        }
        let names: Vec<_> = store
            .list_request_types()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["account-removal", "data-quota", "vice"]);
    }

    #[tokio::test]
    async fn create_request_records_initial_update() {
        let store = MemoryStore::with_default_status_codes();
        let rt = store
            .insert_request_type(RequestType::new("vice"))
            .await
            .unwrap();
        let submitted = store.find_status_code("submitted").await.unwrap().unwrap();

        let request = store
            .create_request(new_request("alice", rt), &submitted)
            .await
            .unwrap();
        assert_eq!(request.updates.len(), 1);
        assert_eq!(request.updates[0].sequence, 1);
        assert_eq!(request.updates[0].updating_user, "alice");
        assert_eq!(store.request_count(), 1);
    }

    #[tokio::test]
    async fn append_to_unknown_request_is_none() {
        let store = MemoryStore::with_default_status_codes();
        let approved = store.find_status_code("approved").await.unwrap().unwrap();
        let result = store
            .append_status(RequestId::new(), &approved, "admin1", None)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn updating_a_type_refreshes_embedded_copies() {
        let store = MemoryStore::with_default_status_codes();
        let rt = store
            .insert_request_type(RequestType::new("vice"))
            .await
            .unwrap();
        let submitted = store.find_status_code("submitted").await.unwrap().unwrap();
        let request = store
            .create_request(new_request("alice", rt), &submitted)
            .await
            .unwrap();

        store
            .update_request_type(
                "vice",
                &RequestTypeUpdate {
                    maximum_requests_per_user: Some(Some(2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        let reloaded = store.find_request(request.id).await.unwrap().unwrap();
        assert_eq!(reloaded.request_type.maximum_requests_per_user, Some(2));
    }

    #[tokio::test]
    async fn count_requests_open_only_skips_completed() {
        let store = MemoryStore::with_default_status_codes();
        let rt = store
            .insert_request_type(RequestType::new("vice"))
            .await
            .unwrap();
        let submitted = store.find_status_code("submitted").await.unwrap().unwrap();
        let approved = store.find_status_code("approved").await.unwrap().unwrap();

        let done = store
            .create_request(new_request("alice", rt.clone()), &submitted)
            .await
            .unwrap();
        store
            .create_request(new_request("alice", rt.clone()), &submitted)
            .await
            .unwrap();
        store
            .create_request(new_request("bob", rt.clone()), &submitted)
            .await
            .unwrap();
        store
            .append_status(done.id, &approved, "admin1", None)
            .await
            .unwrap();

        assert_eq!(store.count_requests("alice", rt.id, false).await.unwrap(), 2);
        assert_eq!(store.count_requests("alice", rt.id, true).await.unwrap(), 1);
    }
}
