//! Request records and their status histories.

use std::sync::Arc;

use adreq_core::{
    NewRequest, Request, RequestError, RequestFilter, RequestId, RequestSummary, RequestType,
    RequestTypeId, StatusCode, StatusUpdate,
};

use crate::persistence::Persistence;

/// Ordered, append-only access to requests.
#[derive(Debug, Clone)]
pub struct RequestStore {
    store: Arc<dyn Persistence>,
}

impl RequestStore {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    /// Persist a new request and its first status update in one write.
    pub async fn create_request(
        &self,
        requesting_user: &str,
        request_type: RequestType,
        details: serde_json::Value,
        initial_status: &StatusCode,
    ) -> Result<Request, RequestError> {
        let request = self
            .store
            .create_request(
                NewRequest {
                    requesting_user: requesting_user.to_string(),
                    request_type,
                    details,
                },
                initial_status,
            )
            .await?;
        tracing::info!(
            request_id = %request.id,
            request_type = %request.request_type.name,
            user = %request.requesting_user,
            status = %initial_status.name,
            "request created"
        );
        Ok(request)
    }

    /// Append a status update. Appends to one request are serialized by the
    /// backend, so each receives the next sequence number.
    pub async fn append_status(
        &self,
        request_id: RequestId,
        status: &StatusCode,
        updating_user: &str,
        message: Option<&str>,
    ) -> Result<StatusUpdate, RequestError> {
        let update = self
            .store
            .append_status(request_id, status, updating_user, message)
            .await?
            .ok_or_else(|| RequestError::request_not_found(request_id))?;
        tracing::info!(
            request_id = %request_id,
            sequence = update.sequence,
            status = %status.name,
            user = %updating_user,
            "status update appended"
        );
        Ok(update)
    }

    /// A request with its full history.
    pub async fn get_request(&self, request_id: RequestId) -> Result<Request, RequestError> {
        self.store
            .find_request(request_id)
            .await?
            .ok_or_else(|| RequestError::request_not_found(request_id))
    }

    /// Matching requests, newest first.
    pub async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<RequestSummary>, RequestError> {
        self.store.list_requests(filter).await
    }

    pub async fn count_requests(
        &self,
        requesting_user: &str,
        request_type: RequestTypeId,
        open_only: bool,
    ) -> Result<u64, RequestError> {
        self.store
            .count_requests(requesting_user, request_type, open_only)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use adreq_core::ErrorKind;

    async fn fixture() -> (RequestStore, RequestType, StatusCode, StatusCode) {
        let memory = MemoryStore::with_default_status_codes();
        let rt = memory
            .insert_request_type(RequestType::new("account-removal"))
            .await
            .unwrap();
        let submitted = memory.find_status_code("submitted").await.unwrap().unwrap();
        let approved = memory.find_status_code("approved").await.unwrap().unwrap();
        (RequestStore::new(Arc::new(memory)), rt, submitted, approved)
    }

    #[tokio::test]
    async fn append_extends_history_in_order() {
        let (store, rt, submitted, approved) = fixture().await;
        let request = store
            .create_request("alice", rt, serde_json::json!({}), &submitted)
            .await
            .unwrap();

        let update = store
            .append_status(request.id, &approved, "admin1", Some("looks good"))
            .await
            .unwrap();
        assert_eq!(update.sequence, 2);

        let reloaded = store.get_request(request.id).await.unwrap();
        let names: Vec<_> = reloaded
            .updates
            .iter()
            .map(|u| u.status.name.as_str())
            .collect();
        assert_eq!(names, vec!["submitted", "approved"]);
        assert_eq!(reloaded.current().unwrap().updating_user, "admin1");
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let (store, _, _, approved) = fixture().await;
        let missing = RequestId::new();
        assert_eq!(
            store.get_request(missing).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            store
                .append_status(missing, &approved, "admin1", None)
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filtered() {
        let (store, rt, submitted, approved) = fixture().await;
        let older = store
            .create_request("alice", rt.clone(), serde_json::json!({"n": 1}), &submitted)
            .await
            .unwrap();
        let newer = store
            .create_request("alice", rt.clone(), serde_json::json!({"n": 2}), &submitted)
            .await
            .unwrap();
        store
            .create_request("bob", rt, serde_json::json!({"n": 3}), &submitted)
            .await
            .unwrap();
        store
            .append_status(older.id, &approved, "admin1", None)
            .await
            .unwrap();

        let alice = store
            .list_requests(&RequestFilter {
                requesting_user: Some("alice".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(alice.len(), 2);
        assert!(alice[0].created_at >= alice[1].created_at);

        let open = store
            .list_requests(&RequestFilter {
                requesting_user: Some("alice".into()),
                include_completed: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, newer.id);

        let approved_only = store
            .list_requests(&RequestFilter {
                status: Some("approved".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(approved_only.len(), 1);
        assert_eq!(approved_only[0].current.status.name, "approved");
    }
}
