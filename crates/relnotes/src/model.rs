use std::collections::HashMap;

use serde::Deserialize;

/// Collection envelope used by every Azure DevOps list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseSummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl Release {
    /// The artifact the report is built from. Only position 0 is consulted;
    /// any further artifacts on the release are ignored.
    pub fn deployment_artifact(&self) -> Option<&Artifact> {
        self.artifacts.first()
    }

    pub fn source_branch(&self) -> Option<&str> {
        self.deployment_artifact()?
            .reference("branch")?
            .name
            .as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub definition_reference: HashMap<String, ArtifactSourceReference>,
}

impl Artifact {
    pub fn reference(&self, key: &str) -> Option<&ArtifactSourceReference> {
        self.definition_reference.get(key)
    }

    /// Id of the build run that produced this artifact.
    pub fn build_id(&self) -> Option<&str> {
        self.reference("version")?.id.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactSourceReference {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Work item reference as returned by the build API. The id arrives as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkItemRef {
    pub id: String,
}

impl WorkItemRef {
    pub fn work_item_id(&self) -> anyhow::Result<u64> {
        self.id
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Work item reference has non-numeric id '{}'", self.id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkItem {
    pub id: u64,
    pub fields: WorkItemFields,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkItemFields {
    #[serde(rename = "System.WorkItemType")]
    pub work_item_type: String,
    #[serde(rename = "System.Title")]
    pub title: String,
}

impl WorkItem {
    pub fn is_bug(&self) -> bool {
        self.fields.work_item_type == "Bug"
    }

    pub fn emoji(&self) -> &'static str {
        if self.is_bug() {
            "🐞"
        } else {
            "⭐"
        }
    }
}
