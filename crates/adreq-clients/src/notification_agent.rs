//! Client for the notification agent.
//!
//! Notices are posted to `{base_url}/notification` with type `requests`.
//! The agent is told not to send its own email; the email relay handles
//! that separately.

use adreq_core::{AgentNotice, NoticePayload, NotificationSender, RequestError};
use async_trait::async_trait;
use serde::Serialize;

use crate::error::ClientError;

/// Notification type the agent files request notices under.
pub const NOTIFICATION_TYPE: &str = "requests";

/// Wire body accepted by `POST /notification`.
#[derive(Debug, Serialize)]
pub struct NotificationRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub user: &'a str,
    pub subject: &'a str,
    pub email: bool,
    pub payload: &'a NoticePayload,
}

/// Client for the notification agent.
#[derive(Debug, Clone)]
pub struct NotificationAgentClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl NotificationAgentClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url) -> Self {
        Self { http, base_url }
    }

    /// Post one notice.
    pub async fn post(&self, notice: &AgentNotice) -> Result<(), ClientError> {
        let endpoint = "POST /notification";
        let url = crate::endpoint(&self.base_url, &["notification"])?;
        let body = NotificationRequest {
            kind: NOTIFICATION_TYPE,
            user: &notice.user,
            subject: &notice.subject,
            email: false,
            payload: &notice.payload,
        };

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;

        crate::ensure_success(endpoint, resp).await?;
        tracing::debug!(user = %notice.user, request_id = %notice.payload.request_id, "notice sent");
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for NotificationAgentClient {
    async fn send_message(&self, notice: &AgentNotice) -> Result<(), RequestError> {
        self.post(notice)
            .await
            .map_err(|e| e.into_request_error("notification agent"))
    }
}
