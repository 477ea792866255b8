//! In-memory fakes for the API traits (testing only).
//!
//! Both fakes record every call so tests can assert on what was (and wasn't)
//! requested. [`MockServer`] sits one level lower and records the raw HTTP
//! requests the real clients send.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};

use crate::devops::DevOpsApi;
use crate::model::{
    Artifact, ArtifactSourceReference, Release, ReleaseSummary, WorkItem, WorkItemFields,
    WorkItemRef,
};
use crate::sink::{ChatApiError, MessageReceipt, NotificationSender, SendError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    ListReleases { branch: String, top: u32 },
    GetRelease(u64),
    GetBuildWorkItemRefs(String),
    GetWorkItems(Vec<u64>),
}

#[derive(Debug, Default)]
pub struct FakeDevOps {
    releases: Vec<(String, Release)>,
    work_item_refs: HashMap<String, Vec<String>>,
    work_items: HashMap<u64, WorkItem>,
    calls: Mutex<Vec<ApiCall>>,
}

impl FakeDevOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases are returned newest first in insertion order.
    pub fn with_release(mut self, branch: &str, release: Release) -> Self {
        self.releases.push((branch.to_string(), release));
        self
    }

    pub fn with_build(mut self, build_id: &str, work_item_ids: &[&str]) -> Self {
        self.work_item_refs.insert(
            build_id.to_string(),
            work_item_ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    pub fn with_work_item(mut self, id: u64, kind: &str, title: &str) -> Self {
        self.work_items.insert(id, work_item(id, kind, title));
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DevOpsApi for FakeDevOps {
    async fn list_releases(&self, branch: &str, top: u32) -> Result<Vec<ReleaseSummary>> {
        self.record(ApiCall::ListReleases {
            branch: branch.to_string(),
            top,
        });
        Ok(self
            .releases
            .iter()
            .filter(|(b, _)| b == branch)
            .take(top as usize)
            .map(|(_, r)| ReleaseSummary {
                id: r.id,
                name: r.name.clone(),
            })
            .collect())
    }

    async fn get_release(&self, release_id: u64) -> Result<Release> {
        self.record(ApiCall::GetRelease(release_id));
        self.releases
            .iter()
            .map(|(_, r)| r)
            .find(|r| r.id == release_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("release {release_id} not found"))
    }

    async fn get_build_work_item_refs(&self, build_id: &str) -> Result<Vec<WorkItemRef>> {
        self.record(ApiCall::GetBuildWorkItemRefs(build_id.to_string()));
        Ok(self
            .work_item_refs
            .get(build_id)
            .map(|ids| {
                ids.iter()
                    .map(|id| WorkItemRef { id: id.clone() })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_work_items(&self, ids: &[u64]) -> Result<Vec<WorkItem>> {
        self.record(ApiCall::GetWorkItems(ids.to_vec()));
        ids.iter()
            .map(|id| {
                self.work_items
                    .get(id)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("work item {id} does not exist"))
            })
            .collect()
    }
}

/// A sender that records messages and answers with a canned result.
#[derive(Debug, Default)]
pub struct FakeSender {
    fail_with: Option<String>,
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail with the given Slack error code.
    pub fn failing(error: &str) -> Self {
        Self {
            fail_with: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for FakeSender {
    async fn send(&self, channel: &str, text: &str) -> Result<MessageReceipt, SendError> {
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), text.to_string()));
        match &self.fail_with {
            Some(error) => Err(ChatApiError::new(error.clone(), 200, serde_json::json!({"ok": false, "error": error})).into()),
            None => Ok(MessageReceipt {
                channel: channel.to_string(),
                ts: "1700000000.000100".to_string(),
            }),
        }
    }
}

pub fn release(id: u64, name: &str, build_ids: &[&str]) -> Release {
    let artifacts = build_ids
        .iter()
        .map(|build_id| Artifact {
            alias: Some("_app".to_string()),
            kind: Some("Build".to_string()),
            definition_reference: HashMap::from([(
                "version".to_string(),
                ArtifactSourceReference {
                    id: Some(build_id.to_string()),
                    name: Some(format!("build-{build_id}")),
                },
            )]),
        })
        .collect();
    Release {
        id,
        name: name.to_string(),
        artifacts,
    }
}

pub fn work_item(id: u64, kind: &str, title: &str) -> WorkItem {
    WorkItem {
        id,
        fields: WorkItemFields {
            work_item_type: kind.to_string(),
            title: title.to_string(),
        },
    }
}

/// A request as seen by [`MockServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}

#[derive(Default)]
struct MockState {
    routes: HashMap<String, (u16, String)>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Local HTTP server that answers canned JSON per path and records requests.
/// Unknown paths get a 404.
pub struct MockServer {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockServer {
    pub async fn start(routes: &[(&str, u16, serde_json::Value)]) -> Self {
        let state = Arc::new(MockState {
            routes: routes
                .iter()
                .map(|(path, status, body)| (path.to_string(), (*status, body.to_string())))
                .collect(),
            requests: Mutex::new(Vec::new()),
        });
        let app = axum::Router::new()
            .fallback(record_and_answer)
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}/"),
            state,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn record_and_answer(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let parsed = reqwest::Url::parse(&format!("http://mock{uri}")).unwrap();
    let request = RecordedRequest {
        method: method.to_string(),
        path: parsed.path().to_string(),
        query: parsed.query_pairs().into_owned().collect(),
        headers,
        body: body.to_vec(),
    };
    let answer = state.routes.get(&request.path).cloned();
    state.requests.lock().unwrap().push(request);

    let content_type = [(header::CONTENT_TYPE, "application/json")];
    match answer {
        Some((status, body)) => (
            StatusCode::from_u16(status).unwrap(),
            content_type,
            body,
        ),
        None => (StatusCode::NOT_FOUND, content_type, "{}".to_string()),
    }
}

/// A loopback URL nothing is listening on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/")
}
