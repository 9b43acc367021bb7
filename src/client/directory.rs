//! Organization listing with a local fallback copy.
//!
//! The server is always asked first. A successful answer refreshes the cache;
//! when the server is unreachable the last cached copy is served instead and
//! tagged as such so callers can show a degraded-mode notice.

use serde::Serialize;
use tracing::warn;

use super::store::ORGANIZATIONS_KEY;
use super::{ApiClient, ClientError};
use crate::db::OrganizationResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Remote,
    Cache,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub data: T,
    pub source: Source,
}

pub struct OrganizationDirectory {
    client: ApiClient,
}

impl OrganizationDirectory {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Fetched<Vec<OrganizationResponse>>, ClientError> {
        match self.client.organizations().await {
            Ok(organizations) => {
                if let Err(e) = self.save_cache(&organizations) {
                    warn!(error = %e, "Failed to cache organizations");
                }
                Ok(Fetched {
                    data: organizations,
                    source: Source::Remote,
                })
            }
            Err(e) if e.is_unavailable() => match self.cached() {
                Some(organizations) => {
                    warn!(error = %e, "Organization listing unavailable, serving cached copy");
                    Ok(Fetched {
                        data: organizations,
                        source: Source::Cache,
                    })
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// One organization by slug, falling back to the cached listing
    pub async fn get(&self, slug: &str) -> Result<Fetched<OrganizationResponse>, ClientError> {
        match self.client.organization(slug).await {
            Ok(organization) => Ok(Fetched {
                data: organization,
                source: Source::Remote,
            }),
            Err(e) if e.is_unavailable() => self
                .cached()
                .and_then(|orgs| orgs.into_iter().find(|o| o.slug == slug))
                .map(|organization| Fetched {
                    data: organization,
                    source: Source::Cache,
                })
                .ok_or(e),
            Err(e) => Err(e),
        }
    }

    fn cached(&self) -> Option<Vec<OrganizationResponse>> {
        self.client
            .store()
            .get(ORGANIZATIONS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    fn save_cache(&self, organizations: &[OrganizationResponse]) -> Result<(), ClientError> {
        let raw = serde_json::to_string(organizations).map_err(|e| ClientError::Store(e.to_string()))?;
        self.client.store().set(ORGANIZATIONS_KEY, raw)
    }
}
