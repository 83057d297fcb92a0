//! # Notification Channel Ports
//!
//! The dispatcher reaches three external services through these traits:
//!
//! | Port | Service | Contract |
//! |------|---------|----------|
//! | [`EmailSender`] | email relay | `send(to, subject, template, values)` |
//! | [`NotificationSender`] | notification agent | `send_message(user, payload)` |
//! | [`GroupDirectory`] | group membership | `members(group)` |
//!
//! Implementations must be `Send + Sync` so they can be shared through
//! `Arc` across request-handling tasks, and should apply their own timeout.
//! Any transport failure is reported as
//! [`RequestError::UpstreamUnavailable`](crate::RequestError::UpstreamUnavailable).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::identity::RequestId;

/// An email to be rendered and delivered by the email service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Template the email service renders.
    pub template: String,
    /// Values substituted into the template.
    pub values: serde_json::Value,
}

/// Structured body of a notification-agent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticePayload {
    /// Request type name.
    pub request_type: String,
    /// The request the notice is about.
    pub request_id: RequestId,
    /// Name of the new status.
    pub status: String,
    /// Display name of the new status.
    pub status_display_name: String,
    /// Message attached to the status update.
    pub message: Option<String>,
    /// The user who submitted the request.
    pub requesting_user: String,
    /// The user who performed the transition.
    pub updating_user: String,
}

/// A message addressed to one user through the notification agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentNotice {
    /// Recipient username, without domain qualification.
    pub user: String,
    /// Short human-readable subject.
    pub subject: String,
    /// Structured notice body.
    pub payload: NoticePayload,
}

/// Delivers email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send one email.
    async fn send(&self, message: &EmailMessage) -> Result<(), RequestError>;
}

/// Delivers notification-agent messages.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Send one notice.
    async fn send_message(&self, notice: &AgentNotice) -> Result<(), RequestError>;
}

/// Resolves group membership.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// List the member usernames of a group.
    async fn members(&self, group: &str) -> Result<Vec<String>, RequestError>;
}
