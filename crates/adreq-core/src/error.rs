//! # Error Taxonomy
//!
//! One error type, [`RequestError`], is shared by every primary operation
//! (registration, submission, status update, lookups). Each variant carries
//! enough context to produce a human-readable message; [`ErrorKind`] exposes
//! the classification as data so that outer layers can map it to transport
//! status codes without matching on messages.
//!
//! `UpstreamUnavailable` is the only kind produced by the notification
//! channels. The dispatcher converts it into a per-channel failure record
//! instead of propagating it, because a status change that has already been
//! committed must never be reported as failed.

use thiserror::Error;

/// Classification of a [`RequestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown request type, status code, or request id.
    NotFound,
    /// Out-of-order or duplicate write rejected by the store.
    Conflict,
    /// Malformed input.
    ValidationFailed,
    /// A per-user request limit on the request type would be exceeded.
    LimitExceeded,
    /// Email, notification-agent, or group service unreachable or timed out.
    UpstreamUnavailable,
    /// The persistence driver failed.
    Storage,
}

impl ErrorKind {
    /// Stable machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::ValidationFailed => "validation_failed",
            Self::LimitExceeded => "limit_exceeded",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::Storage => "storage",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the request lifecycle.
#[derive(Error, Debug)]
pub enum RequestError {
    /// The named resource does not exist.
    #[error("{resource} not found: {key}")]
    NotFound {
        /// What kind of resource was looked up ("request type", "status code", "request").
        resource: &'static str,
        /// The key that was looked up.
        key: String,
    },

    /// The store rejected a write that would violate its ordering or
    /// uniqueness guarantees.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The input payload is malformed.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Submitting would exceed a limit configured on the request type.
    #[error("user {user} has reached the limit of {limit} {scope} requests of type {request_type}")]
    LimitExceeded {
        /// The submitting user.
        user: String,
        /// The request type name.
        request_type: String,
        /// "total" or "concurrent".
        scope: &'static str,
        /// The configured limit.
        limit: i32,
    },

    /// A downstream service could not be reached.
    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable {
        /// Which service ("email", "notification-agent", "groups").
        service: &'static str,
        /// Transport or status detail.
        reason: String,
    },

    /// The persistence driver failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl RequestError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Shorthand for a request-type lookup miss.
    pub fn request_type_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            resource: "request type",
            key: name.into(),
        }
    }

    /// Shorthand for a status-code lookup miss.
    pub fn status_code_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            resource: "status code",
            key: name.into(),
        }
    }

    /// Shorthand for a request lookup miss.
    pub fn request_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            resource: "request",
            key: id.to_string(),
        }
    }

    /// Shorthand for an unreachable downstream service.
    pub fn upstream(service: &'static str, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_resource_and_key() {
        let err = RequestError::request_type_not_found("account-removal");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "request type not found: account-removal");
    }

    #[test]
    fn limit_exceeded_message_is_readable() {
        let err = RequestError::LimitExceeded {
            user: "alice".into(),
            request_type: "vice".into(),
            scope: "concurrent",
            limit: 1,
        };
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
        assert!(err.to_string().contains("limit of 1 concurrent requests"));
    }

    #[test]
    fn upstream_kind() {
        let err = RequestError::upstream("groups", "connection refused");
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(err.to_string(), "groups unavailable: connection refused");
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(ErrorKind::ValidationFailed.as_str(), "validation_failed");
        assert_eq!(ErrorKind::Conflict.to_string(), "conflict");
    }
}
