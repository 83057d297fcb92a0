//! Reference-data registries.
//!
//! Request types and status codes are rows in the backing store, not
//! process-wide singletons. The registries add name validation and turn
//! missing rows into `NotFound`.

use std::sync::Arc;

use adreq_core::model::MAX_REQUEST_TYPE_NAME_LEN;
use adreq_core::{RequestError, RequestType, RequestTypeUpdate, StatusCode};

use crate::persistence::Persistence;

/// Registration and lookup of request types.
#[derive(Debug, Clone)]
pub struct RequestTypeRegistry {
    store: Arc<dyn Persistence>,
}

impl RequestTypeRegistry {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    /// Register `name`, or return the existing record if it is already
    /// registered. Concurrent registrations of one name all observe the
    /// first writer's record.
    pub async fn register(&self, name: &str) -> Result<RequestType, RequestError> {
        validate_name(name)?;
        let stored = self.store.insert_request_type(RequestType::new(name)).await?;
        tracing::debug!(request_type = %stored.name, id = %stored.id, "request type registered");
        Ok(stored)
    }

    /// Change the per-user limits of a registered type. An empty update
    /// writes nothing and returns the stored record.
    pub async fn update(
        &self,
        name: &str,
        update: RequestTypeUpdate,
    ) -> Result<RequestType, RequestError> {
        update.validate().map_err(RequestError::ValidationFailed)?;
        if update.is_empty() {
            return self.get(name).await;
        }
        let updated = self
            .store
            .update_request_type(name, &update)
            .await?
            .ok_or_else(|| RequestError::request_type_not_found(name))?;
        tracing::info!(
            request_type = %updated.name,
            maximum_requests_per_user = ?updated.maximum_requests_per_user,
            maximum_concurrent_requests_per_user = ?updated.maximum_concurrent_requests_per_user,
            "request type limits updated"
        );
        Ok(updated)
    }

    pub async fn get(&self, name: &str) -> Result<RequestType, RequestError> {
        self.store
            .find_request_type(name)
            .await?
            .ok_or_else(|| RequestError::request_type_not_found(name))
    }

    /// All registered types, sorted by name.
    pub async fn list(&self) -> Result<Vec<RequestType>, RequestError> {
        self.store.list_request_types().await
    }
}

fn validate_name(name: &str) -> Result<(), RequestError> {
    if name.trim().is_empty() {
        return Err(RequestError::ValidationFailed(
            "request type name must not be blank".into(),
        ));
    }
    let len = name.chars().count();
    if len > MAX_REQUEST_TYPE_NAME_LEN {
        return Err(RequestError::ValidationFailed(format!(
            "request type name is {len} characters, the maximum is {MAX_REQUEST_TYPE_NAME_LEN}"
        )));
    }
    Ok(())
}

/// Lookup of the seeded status codes.
#[derive(Debug, Clone)]
pub struct StatusCodeRegistry {
    store: Arc<dyn Persistence>,
}

impl StatusCodeRegistry {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self { store }
    }

    pub async fn get(&self, name: &str) -> Result<StatusCode, RequestError> {
        self.store
            .find_status_code(name)
            .await?
            .ok_or_else(|| RequestError::status_code_not_found(name))
    }

    /// All status codes, sorted by name.
    pub async fn list(&self) -> Result<Vec<StatusCode>, RequestError> {
        self.store.list_status_codes().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use adreq_core::ErrorKind;

    fn registries() -> (RequestTypeRegistry, StatusCodeRegistry) {
        let store: Arc<dyn Persistence> = Arc::new(MemoryStore::with_default_status_codes());
        (
            RequestTypeRegistry::new(store.clone()),
            StatusCodeRegistry::new(store),
        )
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let (types, _) = registries();
        let first = types.register("account-removal").await.unwrap();
        let again = types.register("account-removal").await.unwrap();
        assert_eq!(first, again);
        assert_eq!(types.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn names_are_case_sensitive() {
        let (types, _) = registries();
        let lower = types.register("vice").await.unwrap();
        let upper = types.register("VICE").await.unwrap();
        assert_ne!(lower.id, upper.id);
        assert_eq!(
            types.get("Vice").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn blank_and_overlong_names_are_rejected() {
        let (types, _) = registries();
        let long = "x".repeat(MAX_REQUEST_TYPE_NAME_LEN + 1);
        for bad in ["", "   ", long.as_str()] {
            let err = types.register(bad).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        }
        assert!(types
            .register(&"x".repeat(MAX_REQUEST_TYPE_NAME_LEN))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn update_unknown_type_is_not_found() {
        let (types, _) = registries();
        let err = types
            .update("nope", RequestTypeUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn empty_update_returns_stored_limits() {
        let (types, _) = registries();
        types.register("vice").await.unwrap();
        types
            .update(
                "vice",
                RequestTypeUpdate {
                    maximum_requests_per_user: Some(Some(2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let unchanged = types.update("vice", RequestTypeUpdate::default()).await.unwrap();
        assert_eq!(unchanged.maximum_requests_per_user, Some(2));
        assert_eq!(unchanged.maximum_concurrent_requests_per_user, None);
    }

    #[tokio::test]
    async fn update_rejects_negative_limits() {
        let (types, _) = registries();
        types.register("vice").await.unwrap();
        let err = types
            .update(
                "vice",
                RequestTypeUpdate {
                    maximum_concurrent_requests_per_user: Some(Some(-2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(
            types
                .get("vice")
                .await
                .unwrap()
                .maximum_concurrent_requests_per_user,
            None
        );
    }

    #[tokio::test]
    async fn status_codes_are_listed_by_name() {
        let (_, codes) = registries();
        let names: Vec<_> = codes
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["approved", "in-progress", "rejected", "submitted"]);
        assert!(codes.get("approved").await.unwrap().completes_request);
        assert_eq!(
            codes.get("closed").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
