//! # adreq-clients -- HTTP adapters for the notification services
//!
//! Implements the channel ports from `adreq-core` over `reqwest`:
//! - [`EmailClient`] posts templated email to the email relay.
//! - [`NotificationAgentClient`] posts notices to the notification agent.
//! - [`GroupsClient`] lists group members from the group-membership service.
//!
//! All three share one `reqwest::Client` carrying the configured timeout.
//! No call is retried: a failure is reported to the caller as
//! `RequestError::UpstreamUnavailable` through the port traits.

pub mod config;
pub mod email;
pub mod error;
pub mod groups;
pub mod notification_agent;

pub use config::ClientConfig;
pub use email::EmailClient;
pub use error::ClientError;
pub use groups::GroupsClient;
pub use notification_agent::NotificationAgentClient;

use std::time::Duration;

/// The three service clients, built from one configuration.
#[derive(Debug, Clone)]
pub struct ServiceClients {
    email: EmailClient,
    notification_agent: NotificationAgentClient,
    groups: GroupsClient,
}

impl ServiceClients {
    /// Build the clients from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            email: EmailClient::new(http.clone(), config.email_url, config.email_from),
            notification_agent: NotificationAgentClient::new(
                http.clone(),
                config.notification_agent_url,
            ),
            groups: GroupsClient::new(http, config.groups_url, config.groups_user),
        })
    }

    /// Access the email relay client.
    pub fn email(&self) -> &EmailClient {
        &self.email
    }

    /// Access the notification agent client.
    pub fn notification_agent(&self) -> &NotificationAgentClient {
        &self.notification_agent
    }

    /// Access the group-membership client.
    pub fn groups(&self) -> &GroupsClient {
        &self.groups
    }
}

/// Append path segments to a base URL. Segments are percent-encoded.
pub(crate) fn endpoint(base: &url::Url, segments: &[&str]) -> Result<url::Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidBaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Turn a non-2xx response into `ClientError::ApiError`.
pub(crate) async fn ensure_success(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::ApiError {
        endpoint: endpoint.to_string(),
        status,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_to_root_and_nested_bases() {
        let root: url::Url = "http://groups:8080".parse().unwrap();
        assert_eq!(
            endpoint(&root, &["groups", "de-admins", "members"]).unwrap().as_str(),
            "http://groups:8080/groups/de-admins/members"
        );

        let nested: url::Url = "http://proxy/iplant-groups/".parse().unwrap();
        assert_eq!(
            endpoint(&nested, &["notification"]).unwrap().as_str(),
            "http://proxy/iplant-groups/notification"
        );
    }

    #[test]
    fn endpoint_encodes_group_names() {
        let root: url::Url = "http://groups".parse().unwrap();
        assert_eq!(
            endpoint(&root, &["groups", "iplant:de:admins", "members"])
                .unwrap()
                .as_str(),
            "http://groups/groups/iplant:de:admins/members"
        );
        assert_eq!(
            endpoint(&root, &["groups", "a b/c", "members"])
                .unwrap()
                .as_str(),
            "http://groups/groups/a%20b%2Fc/members"
        );
    }
}
