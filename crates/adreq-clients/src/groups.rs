//! Client for the group-membership service.
//!
//! `GET {base_url}/groups/{group}/members?user={service_user}` returns
//! `{"members": [{"id": "..."}, ...]}`. Only the member ids are used.

use adreq_core::{GroupDirectory, RequestError};
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ClientError;

/// One group member. The service returns more fields than this.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMember {
    pub id: String,
}

/// Membership listing.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMembers {
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

/// Client for the group-membership service.
#[derive(Debug, Clone)]
pub struct GroupsClient {
    http: reqwest::Client,
    base_url: url::Url,
    service_user: String,
}

impl GroupsClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url, service_user: String) -> Self {
        Self {
            http,
            base_url,
            service_user,
        }
    }

    /// List the members of `group`.
    pub async fn list_members(&self, group: &str) -> Result<GroupMembers, ClientError> {
        let endpoint = format!("GET /groups/{group}/members");
        let url = crate::endpoint(&self.base_url, &["groups", group, "members"])?;

        let resp = self
            .http
            .get(url)
            .query(&[("user", self.service_user.as_str())])
            .send()
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let resp = crate::ensure_success(&endpoint, resp).await?;
        resp.json().await.map_err(|e| ClientError::Deserialization {
            endpoint,
            source: e,
        })
    }
}

#[async_trait]
impl GroupDirectory for GroupsClient {
    async fn members(&self, group: &str) -> Result<Vec<String>, RequestError> {
        let listing = self
            .list_members(group)
            .await
            .map_err(|e| e.into_request_error("group directory"))?;
        Ok(listing.members.into_iter().map(|m| m.id).collect())
    }
}
