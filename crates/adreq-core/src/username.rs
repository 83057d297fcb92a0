//! Username qualification.
//!
//! Platform usernames arrive either bare (`alice`) or qualified with the
//! platform's user domain (`alice@iplantcollaborative.org`). The email
//! service wants the qualified form as the address; the notification agent
//! wants the bare form.

/// The platform's user domain, e.g. `iplantcollaborative.org`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDomain(String);

impl UserDomain {
    /// Wrap a domain. A leading `@` is ignored.
    pub fn new(domain: impl Into<String>) -> Self {
        let domain = domain.into();
        Self(domain.trim().trim_start_matches('@').to_string())
    }

    /// The domain without a leading `@`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Email address for a username. Usernames that already contain `@` are
    /// returned unchanged.
    pub fn address_of(&self, username: &str) -> String {
        if username.contains('@') || self.0.is_empty() {
            username.to_string()
        } else {
            format!("{username}@{}", self.0)
        }
    }

    /// Strip this domain from a username, if present.
    pub fn strip<'a>(&self, username: &'a str) -> &'a str {
        if self.0.is_empty() {
            return username;
        }
        username
            .strip_suffix(self.0.as_str())
            .and_then(|rest| rest.strip_suffix('@'))
            .unwrap_or(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifies_bare_usernames() {
        let domain = UserDomain::new("@iplantcollaborative.org");
        assert_eq!(domain.as_str(), "iplantcollaborative.org");
        assert_eq!(domain.address_of("alice"), "alice@iplantcollaborative.org");
    }

    #[test]
    fn leaves_addresses_alone() {
        let domain = UserDomain::new("iplantcollaborative.org");
        assert_eq!(domain.address_of("bob@example.com"), "bob@example.com");
    }

    #[test]
    fn strips_only_the_configured_domain() {
        let domain = UserDomain::new("iplantcollaborative.org");
        assert_eq!(domain.strip("alice@iplantcollaborative.org"), "alice");
        assert_eq!(domain.strip("alice"), "alice");
        assert_eq!(domain.strip("bob@example.com"), "bob@example.com");
        assert_eq!(domain.strip("xiplantcollaborative.org"), "xiplantcollaborative.org");
    }

    #[test]
    fn empty_domain_is_identity() {
        let domain = UserDomain::new("");
        assert_eq!(domain.address_of("alice"), "alice");
        assert_eq!(domain.strip("alice@x"), "alice@x");
    }
}
