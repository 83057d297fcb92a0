//! # Request Model
//!
//! Records owned by the store. A [`Request`] owns its ordered, append-only
//! history of [`StatusUpdate`] entries and is never observable with an empty
//! history.
//!
//! ## Ordering
//!
//! Every update carries a per-request `sequence` starting at 1. The store
//! assigns sequences under a serialized write path and never lets
//! `created_at` run backwards along the sequence, so "latest by
//! `created_at`, ties broken by `sequence`" and "highest `sequence`" always
//! name the same entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{RequestId, RequestTypeId, StatusCodeId, StatusUpdateId};

/// Maximum length of a request type name.
pub const MAX_REQUEST_TYPE_NAME_LEN: usize = 255;

/// Maximum length of a requesting or updating username. Matches the
/// `VARCHAR(512)` user columns in the store's schema.
pub const MAX_USERNAME_LEN: usize = 512;

/// A registered category of administrative request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestType {
    /// Store-assigned identifier.
    pub id: RequestTypeId,
    /// Unique, case-sensitive name.
    pub name: String,
    /// Maximum number of requests of this type a single user may submit.
    pub maximum_requests_per_user: Option<i32>,
    /// Maximum number of open requests of this type a single user may hold.
    pub maximum_concurrent_requests_per_user: Option<i32>,
}

impl RequestType {
    /// Build an unlimited request type with a fresh identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RequestTypeId::new(),
            name: name.into(),
            maximum_requests_per_user: None,
            maximum_concurrent_requests_per_user: None,
        }
    }

    /// Apply an update to the mutable fields.
    pub fn apply(&mut self, update: &RequestTypeUpdate) {
        if let Some(max) = update.maximum_requests_per_user {
            self.maximum_requests_per_user = max;
        }
        if let Some(max) = update.maximum_concurrent_requests_per_user {
            self.maximum_concurrent_requests_per_user = max;
        }
    }
}

/// Changes to the mutable fields of a [`RequestType`].
///
/// The outer `Option` says whether the field is being changed; the inner
/// `Option` is the new value, where `None` removes the limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestTypeUpdate {
    /// New total-request limit.
    pub maximum_requests_per_user: Option<Option<i32>>,
    /// New concurrent-request limit.
    pub maximum_concurrent_requests_per_user: Option<Option<i32>>,
}

impl RequestTypeUpdate {
    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.maximum_requests_per_user.is_none()
            && self.maximum_concurrent_requests_per_user.is_none()
    }

    /// Reject negative limits.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("maximum_requests_per_user", self.maximum_requests_per_user),
            (
                "maximum_concurrent_requests_per_user",
                self.maximum_concurrent_requests_per_user,
            ),
        ];
        for (field, value) in fields {
            if let Some(Some(n)) = value {
                if n < 0 {
                    return Err(format!("{field} must not be negative, got {n}"));
                }
            }
        }
        Ok(())
    }
}

/// A named stage in a request's lifecycle. Reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    /// Store-assigned identifier.
    pub id: StatusCodeId,
    /// Unique name, e.g. `submitted`.
    pub name: String,
    /// Name shown to humans, e.g. `Submitted`.
    pub display_name: String,
    /// Template the email service renders for this status.
    pub email_template: String,
    /// Whether reaching this status closes the request.
    pub completes_request: bool,
}

/// An immutable record that a request moved to a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Store-assigned identifier.
    pub id: StatusUpdateId,
    /// The request this update belongs to.
    pub request_id: RequestId,
    /// Position in the request's history, starting at 1.
    pub sequence: i64,
    /// The status the request moved to.
    pub status: StatusCode,
    /// Who performed the transition.
    pub updating_user: String,
    /// Optional free text.
    pub message: Option<String>,
    /// When the update was recorded.
    pub created_at: DateTime<Utc>,
}

/// A submitted administrative request with its full history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Store-assigned identifier.
    pub id: RequestId,
    /// The submitting user.
    pub requesting_user: String,
    /// The request's type.
    pub request_type: RequestType,
    /// Submitter-supplied payload, passed through untouched.
    pub details: serde_json::Value,
    /// When the request was submitted.
    pub created_at: DateTime<Utc>,
    /// Status history in sequence order. Never empty.
    pub updates: Vec<StatusUpdate>,
}

impl Request {
    /// The latest status update.
    ///
    /// Returns `None` only for a value that did not come from a store.
    pub fn current(&self) -> Option<&StatusUpdate> {
        self.updates
            .iter()
            .max_by(|a, b| (a.created_at, a.sequence).cmp(&(b.created_at, b.sequence)))
    }

    /// Project to a listing summary.
    pub fn summary(&self) -> Option<RequestSummary> {
        self.current().map(|current| RequestSummary {
            id: self.id,
            requesting_user: self.requesting_user.clone(),
            request_type: self.request_type.clone(),
            details: self.details.clone(),
            created_at: self.created_at,
            current: current.clone(),
        })
    }
}

/// A request with only its current status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSummary {
    /// Store-assigned identifier.
    pub id: RequestId,
    /// The submitting user.
    pub requesting_user: String,
    /// The request's type.
    pub request_type: RequestType,
    /// Submitter-supplied payload.
    pub details: serde_json::Value,
    /// When the request was submitted.
    pub created_at: DateTime<Utc>,
    /// The latest status update.
    pub current: StatusUpdate,
}

/// Input for creating a request.
#[derive(Debug, Clone)]
pub struct NewRequest {
    /// The submitting user.
    pub requesting_user: String,
    /// The request's type.
    pub request_type: RequestType,
    /// Submitter-supplied payload.
    pub details: serde_json::Value,
}

/// Listing filter. `None` fields do not restrict the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    /// Exact match on the submitting user.
    pub requesting_user: Option<String>,
    /// Exact match on the current status name.
    pub status: Option<String>,
    /// Exact match on the request type name.
    pub request_type: Option<String>,
    /// `Some(false)` hides requests whose current status completes them.
    pub include_completed: Option<bool>,
}

impl RequestFilter {
    /// Whether a summary passes this filter.
    pub fn matches(&self, summary: &RequestSummary) -> bool {
        if let Some(user) = &self.requesting_user {
            if summary.requesting_user != *user {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if summary.current.status.name != *status {
                return false;
            }
        }
        if let Some(request_type) = &self.request_type {
            if summary.request_type.name != *request_type {
                return false;
            }
        }
        if self.include_completed == Some(false) && summary.current.status.completes_request {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn status(name: &str, completes: bool) -> StatusCode {
        StatusCode {
            id: StatusCodeId::new(),
            name: name.into(),
            display_name: name.to_uppercase(),
            email_template: format!("request_{name}"),
            completes_request: completes,
        }
    }

    fn update(request_id: RequestId, seq: i64, at: DateTime<Utc>, s: StatusCode) -> StatusUpdate {
        StatusUpdate {
            id: StatusUpdateId::new(),
            request_id,
            sequence: seq,
            status: s,
            updating_user: "admin1".into(),
            message: None,
            created_at: at,
        }
    }

    fn request_with(updates: Vec<StatusUpdate>, id: RequestId) -> Request {
        Request {
            id,
            requesting_user: "alice".into(),
            request_type: RequestType::new("account-removal"),
            details: serde_json::json!({}),
            created_at: Utc::now(),
            updates,
        }
    }

    #[test]
    fn current_prefers_latest_timestamp() {
        let id = RequestId::new();
        let t0 = Utc::now();
        let req = request_with(
            vec![
                update(id, 1, t0, status("submitted", false)),
                update(id, 2, t0 + Duration::seconds(5), status("approved", true)),
            ],
            id,
        );
        assert_eq!(req.current().unwrap().status.name, "approved");
    }

    #[test]
    fn current_breaks_timestamp_ties_by_sequence() {
        let id = RequestId::new();
        let t0 = Utc::now();
        let req = request_with(
            vec![
                update(id, 2, t0, status("rejected", true)),
                update(id, 1, t0, status("submitted", false)),
            ],
            id,
        );
        assert_eq!(req.current().unwrap().sequence, 2);
    }

    #[test]
    fn summary_of_empty_history_is_none() {
        let req = request_with(vec![], RequestId::new());
        assert!(req.summary().is_none());
    }

    #[test]
    fn filter_matches_on_each_field() {
        let id = RequestId::new();
        let req = request_with(vec![update(id, 1, Utc::now(), status("approved", true))], id);
        let summary = req.summary().unwrap();

        assert!(RequestFilter::default().matches(&summary));
        assert!(RequestFilter {
            requesting_user: Some("alice".into()),
            status: Some("approved".into()),
            request_type: Some("account-removal".into()),
            include_completed: Some(true),
        }
        .matches(&summary));
        assert!(!RequestFilter {
            requesting_user: Some("bob".into()),
            ..Default::default()
        }
        .matches(&summary));
        assert!(!RequestFilter {
            status: Some("Approved".into()),
            ..Default::default()
        }
        .matches(&summary));
        assert!(!RequestFilter {
            include_completed: Some(false),
            ..Default::default()
        }
        .matches(&summary));
    }

    #[test]
    fn update_validation_rejects_negative_limits() {
        let update = RequestTypeUpdate {
            maximum_requests_per_user: Some(Some(-1)),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let clear = RequestTypeUpdate {
            maximum_requests_per_user: Some(None),
            maximum_concurrent_requests_per_user: Some(Some(0)),
        };
        assert!(clear.validate().is_ok());
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut rt = RequestType::new("vice");
        rt.maximum_requests_per_user = Some(3);
        rt.apply(&RequestTypeUpdate {
            maximum_concurrent_requests_per_user: Some(Some(1)),
            ..Default::default()
        });
        assert_eq!(rt.maximum_requests_per_user, Some(3));
        assert_eq!(rt.maximum_concurrent_requests_per_user, Some(1));

        rt.apply(&RequestTypeUpdate {
            maximum_requests_per_user: Some(None),
            ..Default::default()
        });
        assert_eq!(rt.maximum_requests_per_user, None);
    }
}
