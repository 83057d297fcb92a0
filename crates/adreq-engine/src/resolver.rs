//! Administrator resolution.

use std::collections::BTreeSet;
use std::sync::Arc;

use adreq_core::{GroupDirectory, RequestError};

/// Resolves the set of administrators to notify from a directory group.
///
/// The group is queried on every call. Membership changes take effect on
/// the next transition without a restart.
#[derive(Clone)]
pub struct AdminDistributionResolver {
    directory: Arc<dyn GroupDirectory>,
    admin_group: String,
}

impl std::fmt::Debug for AdminDistributionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminDistributionResolver")
            .field("admin_group", &self.admin_group)
            .finish_non_exhaustive()
    }
}

impl AdminDistributionResolver {
    pub fn new(directory: Arc<dyn GroupDirectory>, admin_group: impl Into<String>) -> Self {
        Self {
            directory,
            admin_group: admin_group.into(),
        }
    }

    /// The directory group administrators are drawn from.
    pub fn admin_group(&self) -> &str {
        &self.admin_group
    }

    /// Current administrator usernames. Blank names are dropped and
    /// duplicates collapse.
    pub async fn resolve_admins(&self) -> Result<BTreeSet<String>, RequestError> {
        let members = self.directory.members(&self.admin_group).await?;
        let admins: BTreeSet<String> = members
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        tracing::debug!(group = %self.admin_group, count = admins.len(), "administrators resolved");
        Ok(admins)
    }
}
