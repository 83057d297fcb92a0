//! Client for the email relay.
//!
//! The relay renders a named template with the supplied values and
//! delivers the result. One call per message: `POST {base_url}`.

use adreq_core::{EmailMessage, EmailSender, RequestError};
use async_trait::async_trait;
use serde::Serialize;

use crate::error::ClientError;

/// Wire body accepted by the relay.
#[derive(Debug, Serialize)]
pub struct EmailRequest<'a> {
    pub to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_addr: Option<&'a str>,
    pub subject: &'a str,
    pub template: &'a str,
    pub values: &'a serde_json::Value,
}

/// Client for the email relay.
#[derive(Debug, Clone)]
pub struct EmailClient {
    http: reqwest::Client,
    base_url: url::Url,
    from: Option<String>,
}

impl EmailClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url, from: Option<String>) -> Self {
        Self {
            http,
            base_url,
            from,
        }
    }

    /// Send one templated email.
    pub async fn post(&self, message: &EmailMessage) -> Result<(), ClientError> {
        let endpoint = "POST /";
        let body = EmailRequest {
            to: &message.to,
            from_addr: self.from.as_deref(),
            subject: &message.subject,
            template: &message.template,
            values: &message.values,
        };

        let resp = self
            .http
            .post(self.base_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        crate::ensure_success(endpoint, resp).await?;
        tracing::debug!(to = %message.to, template = %message.template, "email sent");
        Ok(())
    }
}

#[async_trait]
impl EmailSender for EmailClient {
    async fn send(&self, message: &EmailMessage) -> Result<(), RequestError> {
        self.post(message)
            .await
            .map_err(|e| e.into_request_error("email"))
    }
}
