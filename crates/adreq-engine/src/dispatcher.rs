//! # Notification Dispatch
//!
//! Fans one committed status update out to everyone who should hear about
//! it:
//!
//! 1. **Requester email** via the email relay, rendered with the status's
//!    `email_template`, addressed to the requester's qualified address.
//! 2. **Requester notice** via the notification agent, addressed to the
//!    bare username.
//! 3. **Administrator notices**, one per resolved administrator.
//! 4. **Administrator email**, to the configured distribution address if
//!    there is one, otherwise one per resolved administrator.
//!
//! Every attempt runs regardless of how the others went. Failures are
//! collected into the [`DispatchResult`] and never propagate: by the time
//! dispatch runs, the update is already committed.

use std::sync::Arc;

use adreq_core::{
    AgentNotice, EmailMessage, EmailSender, NoticePayload, NotificationSender, Request,
    StatusUpdate, UserDomain,
};

use crate::resolver::AdminDistributionResolver;

/// A delivery path a notification can fail on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    NotificationAgent,
    AdminResolution,
    /// The dispatch task itself did not complete.
    Dispatch,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::NotificationAgent => "notification_agent",
            Self::AdminResolution => "admin_resolution",
            Self::Dispatch => "dispatch",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFailure {
    pub channel: Channel,
    /// Address or username the attempt was for. `None` when the failure was
    /// not tied to a single recipient.
    pub recipient: Option<String>,
    pub reason: String,
}

impl std::fmt::Display for ChannelFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.recipient {
            Some(recipient) => write!(f, "{} to {recipient} failed: {}", self.channel, self.reason),
            None => write!(f, "{} failed: {}", self.channel, self.reason),
        }
    }
}

/// Per-channel outcome of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    /// Every email attempt succeeded.
    pub email_ok: bool,
    /// Every notification-agent attempt succeeded.
    pub agent_ok: bool,
    /// The administrator group was resolved.
    pub admin_resolution_ok: bool,
    pub failures: Vec<ChannelFailure>,
}

impl Default for DispatchResult {
    fn default() -> Self {
        Self {
            email_ok: true,
            agent_ok: true,
            admin_resolution_ok: true,
            failures: Vec::new(),
        }
    }
}

impl DispatchResult {
    /// Result for a dispatch that never ran to completion.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self {
            email_ok: false,
            agent_ok: false,
            admin_resolution_ok: false,
            failures: vec![ChannelFailure {
                channel: Channel::Dispatch,
                recipient: None,
                reason: reason.into(),
            }],
        }
    }

    /// True when nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, channel: Channel, recipient: Option<&str>, reason: String) {
        match channel {
            Channel::Email => self.email_ok = false,
            Channel::NotificationAgent => self.agent_ok = false,
            Channel::AdminResolution => self.admin_resolution_ok = false,
            Channel::Dispatch => {}
        }
        tracing::warn!(
            channel = %channel,
            recipient = recipient.unwrap_or("-"),
            reason = %reason,
            "notification failed"
        );
        self.failures.push(ChannelFailure {
            channel,
            recipient: recipient.map(str::to_string),
            reason,
        });
    }
}

fn count(channel: Channel, ok: bool) {
    let outcome = if ok { "success" } else { "failure" };
    metrics::counter!(
        "adreq_notifications_total",
        "channel" => channel.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Sends the notifications for committed status updates.
#[derive(Clone)]
pub struct NotificationDispatcher {
    email: Arc<dyn EmailSender>,
    agent: Arc<dyn NotificationSender>,
    resolver: AdminDistributionResolver,
    user_domain: UserDomain,
    admin_email: Option<String>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("resolver", &self.resolver)
            .field("user_domain", &self.user_domain)
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(
        email: Arc<dyn EmailSender>,
        agent: Arc<dyn NotificationSender>,
        resolver: AdminDistributionResolver,
        user_domain: UserDomain,
    ) -> Self {
        Self {
            email,
            agent,
            resolver,
            user_domain,
            admin_email: None,
        }
    }

    /// Send administrator email to one distribution address instead of to
    /// each administrator. Blank addresses are ignored.
    pub fn with_admin_email(mut self, address: impl Into<String>) -> Self {
        let address = address.into();
        self.admin_email = (!address.trim().is_empty()).then_some(address);
        self
    }

    /// Notify the requester and administrators about `update`.
    pub async fn dispatch(&self, request: &Request, update: &StatusUpdate) -> DispatchResult {
        let mut result = DispatchResult::default();

        let admins = match self.resolver.resolve_admins().await {
            Ok(admins) => {
                count(Channel::AdminResolution, true);
                Some(admins)
            }
            Err(e) => {
                count(Channel::AdminResolution, false);
                result.record(
                    Channel::AdminResolution,
                    Some(self.resolver.admin_group()),
                    e.to_string(),
                );
                None
            }
        };

        let requester = request.requesting_user.as_str();
        let values = self.email_values(request, update);

        // Requester.
        let subject = requester_subject(request, update);
        self.send_email(
            &mut result,
            EmailMessage {
                to: self.user_domain.address_of(requester),
                subject: subject.clone(),
                template: update.status.email_template.clone(),
                values: values.clone(),
            },
        )
        .await;
        self.send_notice(&mut result, self.user_domain.strip(requester), &subject, request, update)
            .await;

        // Administrators.
        let admin_subject = admin_subject(request, update);
        for admin in admins.iter().flatten() {
            self.send_notice(
                &mut result,
                self.user_domain.strip(admin),
                &admin_subject,
                request,
                update,
            )
            .await;
        }

        let admin_addresses: Vec<String> = match &self.admin_email {
            Some(address) => vec![address.clone()],
            None => admins
                .iter()
                .flatten()
                .map(|admin| self.user_domain.address_of(admin))
                .collect(),
        };
        for to in admin_addresses {
            self.send_email(
                &mut result,
                EmailMessage {
                    to,
                    subject: admin_subject.clone(),
                    template: update.status.email_template.clone(),
                    values: values.clone(),
                },
            )
            .await;
        }

        tracing::info!(
            request_id = %request.id,
            sequence = update.sequence,
            status = %update.status.name,
            email_ok = result.email_ok,
            agent_ok = result.agent_ok,
            admin_resolution_ok = result.admin_resolution_ok,
            "notifications dispatched"
        );
        result
    }

    async fn send_email(&self, result: &mut DispatchResult, message: EmailMessage) {
        match self.email.send(&message).await {
            Ok(()) => count(Channel::Email, true),
            Err(e) => {
                count(Channel::Email, false);
                result.record(Channel::Email, Some(&message.to), e.to_string());
            }
        }
    }

    async fn send_notice(
        &self,
        result: &mut DispatchResult,
        user: &str,
        subject: &str,
        request: &Request,
        update: &StatusUpdate,
    ) {
        let notice = AgentNotice {
            user: user.to_string(),
            subject: subject.to_string(),
            payload: NoticePayload {
                request_type: request.request_type.name.clone(),
                request_id: request.id,
                status: update.status.name.clone(),
                status_display_name: update.status.display_name.clone(),
                message: update.message.clone(),
                requesting_user: request.requesting_user.clone(),
                updating_user: update.updating_user.clone(),
            },
        };
        match self.agent.send_message(&notice).await {
            Ok(()) => count(Channel::NotificationAgent, true),
            Err(e) => {
                count(Channel::NotificationAgent, false);
                result.record(Channel::NotificationAgent, Some(user), e.to_string());
            }
        }
    }

    fn email_values(&self, request: &Request, update: &StatusUpdate) -> serde_json::Value {
        serde_json::json!({
            "username": self.user_domain.strip(&request.requesting_user),
            "request_id": request.id,
            "request_type": request.request_type.name,
            "request_details": request.details,
            "status": update.status.name,
            "status_display_name": update.status.display_name,
            "update_message": update.message,
            "updating_user": update.updating_user,
        })
    }
}

fn requester_subject(request: &Request, update: &StatusUpdate) -> String {
    format!(
        "{} request {}",
        request.request_type.name,
        update.status.display_name.to_lowercase()
    )
}

fn admin_subject(request: &Request, update: &StatusUpdate) -> String {
    format!(
        "{} request from {} {}",
        request.request_type.name,
        request.requesting_user,
        update.status.display_name.to_lowercase()
    )
}
