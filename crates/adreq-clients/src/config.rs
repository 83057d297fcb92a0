//! Client configuration.
//!
//! Base URLs for the three downstream services plus the identity the
//! group service expects on every call. The HTTP service fills this from
//! its YAML configuration file.

use url::Url;

/// Default request timeout when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for connecting to the notification services.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the email relay (`iplant_email.base`).
    pub email_url: Url,
    /// Sender address passed through as `from_addr`, if configured.
    pub email_from: Option<String>,
    /// Base URL of the notification agent (`notification_agent.base`).
    pub notification_agent_url: Url,
    /// Base URL of the group-membership service (`iplant_groups.base`).
    pub groups_url: Url,
    /// Service account the group service acts on behalf of (`iplant_groups.user`).
    pub groups_user: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl ClientConfig {
    /// Parse the three base URLs, keeping the default timeout.
    pub fn new(
        email_url: &str,
        notification_agent_url: &str,
        groups_url: &str,
        groups_user: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            email_url: parse_url("iplant_email.base", email_url)?,
            email_from: None,
            notification_agent_url: parse_url("notification_agent.base", notification_agent_url)?,
            groups_url: parse_url("iplant_groups.base", groups_url)?,
            groups_user: groups_user.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Point every service at one mock server (for testing).
    pub fn local_mock(base: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new(base, base, base, "de_grouper")?;
        config.timeout_secs = 5;
        Ok(config)
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(key.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}
