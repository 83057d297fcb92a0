//! Client error types.

use adreq_core::RequestError;

/// Errors from calls to the notification services.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error, including timeouts.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The service returned a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// A base URL cannot carry path segments.
    #[error("base URL {0} cannot be extended with a path")]
    InvalidBaseUrl(String),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ClientError {
    /// Report this failure as an unavailable upstream service.
    pub fn into_request_error(self, service: &'static str) -> RequestError {
        RequestError::upstream(service, self.to_string())
    }
}
