use anyhow::Result;

use crate::devops::DevOpsApi;
use crate::model::Release;

/// Finds the most recent release built from a branch.
///
/// The listing relies on the service's default newest-first ordering and
/// asks for a single result; nothing is re-sorted here.
pub struct ReleaseLookupClient<'a> {
    api: &'a dyn DevOpsApi,
}

impl<'a> ReleaseLookupClient<'a> {
    pub fn new(api: &'a dyn DevOpsApi) -> Self {
        Self { api }
    }

    /// `Ok(None)` when the branch has no releases. That is an expected
    /// outcome, not a failure.
    pub async fn fetch_latest(&self, branch: &str) -> Result<Option<Release>> {
        let releases = self.api.list_releases(branch, 1).await?;
        let Some(latest) = releases.first() else {
            tracing::error!(branch, "No releases found for this branch");
            return Ok(None);
        };

        let release = self.api.get_release(latest.id).await?;
        tracing::debug!(
            release_id = release.id,
            name = %release.name,
            source_branch = release.source_branch().unwrap_or("unknown"),
            "Found latest release"
        );
        Ok(Some(release))
    }
}
