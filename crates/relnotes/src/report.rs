use anyhow::{Context, Result};

use crate::devops::DevOpsApi;
use crate::model::{Release, WorkItem};

/// Builds the plain-text deployment report for a release.
pub struct ReportFormatter<'a> {
    api: &'a dyn DevOpsApi,
}

impl<'a> ReportFormatter<'a> {
    pub fn new(api: &'a dyn DevOpsApi) -> Self {
        Self { api }
    }

    /// Render the report, or an empty string when the release has no
    /// deployment artifact and there is nothing to send.
    pub async fn render(&self, release: &Release) -> Result<String> {
        let Some(artifact) = release.deployment_artifact() else {
            tracing::error!(release = %release.name, "No deployment artifact found for this release");
            return Ok(String::new());
        };

        let build_id = artifact.build_id().with_context(|| {
            format!("Artifact of release '{}' has no build version reference", release.name)
        })?;

        tracing::debug!(
            alias = artifact.alias.as_deref().unwrap_or("-"),
            kind = artifact.kind.as_deref().unwrap_or("-"),
            build_id,
            "Using deployment artifact"
        );

        let refs = self.api.get_build_work_item_refs(build_id).await?;
        let ids = refs
            .iter()
            .map(|r| r.work_item_id())
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Reading work item refs of build {build_id}"))?;
        tracing::debug!(build_id, count = ids.len(), "Work items linked to build");

        // The batch endpoint rejects an empty id list.
        let work_items = if ids.is_empty() {
            Vec::new()
        } else {
            self.api.get_work_items(&ids).await?
        };

        Ok(format_report(&release.name, &work_items))
    }
}

/// Lay out the report text. Lines keep the order of `work_items`.
pub fn format_report(release_name: &str, work_items: &[WorkItem]) -> String {
    let mut message = format!("Deployment Report for {release_name}\n");
    message.push_str("\nList of work items associated with Build:\n");
    for item in work_items {
        message.push_str(&format!("{} {} - {}\n", item.emoji(), item.id, item.fields.title));
    }
    message
}
