use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::config::{AzureDevOpsConfig, Token};
use crate::model::{ListResponse, Release, ReleaseSummary, WorkItem, WorkItemRef};

const API_VERSION: &str = "7.1";
const WORK_ITEM_FIELDS: &str = "System.Title,System.WorkItemType";

/// The slice of the Azure DevOps REST surface this tool reads from.
#[async_trait]
pub trait DevOpsApi: Send + Sync {
    /// Releases whose source branch matches `branch` exactly, newest first.
    async fn list_releases(&self, branch: &str, top: u32) -> Result<Vec<ReleaseSummary>>;

    async fn get_release(&self, release_id: u64) -> Result<Release>;

    async fn get_build_work_item_refs(&self, build_id: &str) -> Result<Vec<WorkItemRef>>;

    /// Fetch full work items in one batch. Response order is whatever the
    /// service returns.
    async fn get_work_items(&self, ids: &[u64]) -> Result<Vec<WorkItem>>;
}

/// HTTP client for Azure DevOps. One connection pool and credential serve
/// both the Release Management and the Build/WIT hosts.
pub struct AzureDevOpsClient {
    http: reqwest::Client,
    organization_url: Url,
    release_url: Url,
    project: String,
    token: Token,
}

impl AzureDevOpsClient {
    pub fn new(cfg: &AzureDevOpsConfig) -> Result<Self> {
        let organization_url = parse_base_url(&cfg.organization_url)
            .with_context(|| format!("Invalid organization URL '{}'", cfg.organization_url))?;
        let release_url = match &cfg.release_url {
            Some(url) => parse_base_url(url).with_context(|| format!("Invalid release URL '{url}'"))?,
            None => release_management_url(&organization_url)?,
        };
        let http = reqwest::Client::builder()
            .user_agent(concat!("relnotes/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Building HTTP client")?;

        Ok(Self {
            http,
            organization_url,
            release_url,
            project: cfg.project.clone(),
            token: cfg.token.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        tracing::debug!(%url, "GET");
        let resp = self
            .http
            .get(url.clone())
            .basic_auth("", Some(self.token.expose()))
            .query(query)
            .query(&[("api-version", API_VERSION)])
            .send()
            .await
            .with_context(|| format!("Requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("Azure DevOps returned an error for {url}"))?;
        resp.json::<T>()
            .await
            .with_context(|| format!("Decoding response from {url}"))
    }
}

#[async_trait]
impl DevOpsApi for AzureDevOpsClient {
    async fn list_releases(&self, branch: &str, top: u32) -> Result<Vec<ReleaseSummary>> {
        let url = endpoint(&self.release_url, &[self.project.as_str(), "_apis", "release", "releases"])?;
        let query = [
            ("sourceBranchFilter", branch.to_string()),
            ("$top", top.to_string()),
        ];
        let list: ListResponse<ReleaseSummary> = self
            .get_json(url, &query)
            .await
            .with_context(|| format!("Listing releases for branch {branch}"))?;
        Ok(list.value)
    }

    async fn get_release(&self, release_id: u64) -> Result<Release> {
        let id = release_id.to_string();
        let url = endpoint(&self.release_url, &[self.project.as_str(), "_apis", "release", "releases", id.as_str()])?;
        self.get_json::<Release>(url, &[])
            .await
            .with_context(|| format!("Fetching release {release_id}"))
    }

    async fn get_build_work_item_refs(&self, build_id: &str) -> Result<Vec<WorkItemRef>> {
        let url = endpoint(
            &self.organization_url,
            &[self.project.as_str(), "_apis", "build", "builds", build_id, "workitems"],
        )?;
        let list: ListResponse<WorkItemRef> = self
            .get_json(url, &[])
            .await
            .with_context(|| format!("Fetching work item refs for build {build_id}"))?;
        Ok(list.value)
    }

    async fn get_work_items(&self, ids: &[u64]) -> Result<Vec<WorkItem>> {
        let url = endpoint(&self.organization_url, &["_apis", "wit", "workitems"])?;
        let query = [
            ("ids", join_ids(ids)),
            ("fields", WORK_ITEM_FIELDS.to_string()),
        ];
        let list: ListResponse<WorkItem> = self
            .get_json(url, &query)
            .await
            .with_context(|| format!("Fetching {} work items", ids.len()))?;
        Ok(list.value)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() {
        return Err(anyhow!("URL cannot be used as a base"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Derive the Release Management host from an organization URL.
///
/// `https://dev.azure.com/org/` maps to `https://vsrm.dev.azure.com/org/` and
/// `https://org.visualstudio.com/` to `https://org.vsrm.visualstudio.com/`.
/// Any other host (on-prem servers) already serves the release API.
pub fn release_management_url(organization_url: &Url) -> Result<Url> {
    let mut url = organization_url.clone();
    let host = organization_url.host_str().unwrap_or_default().to_ascii_lowercase();
    let vsrm_host = if host == "dev.azure.com" {
        Some("vsrm.dev.azure.com".to_string())
    } else if let Some(org) = host.strip_suffix(".visualstudio.com") {
        if org.ends_with(".vsrm") {
            None
        } else {
            Some(format!("{org}.vsrm.visualstudio.com"))
        }
    } else {
        None
    };
    if let Some(vsrm_host) = vsrm_host {
        url.set_host(Some(&vsrm_host))
            .with_context(|| format!("Deriving release URL from {organization_url}"))?;
    }
    Ok(url)
}

/// Append path segments to a base URL, percent-encoding each one.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("URL {base} cannot be used as a base"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}
