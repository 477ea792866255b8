use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{SlackConfig, Token};

/// Slack rejected the message, either with a non-2xx status or `ok: false`.
#[derive(Debug, Error)]
#[error("The request to the Slack API failed (status {status}): {error}")]
pub struct ChatApiError {
    /// Slack's error code, e.g. `channel_not_found`.
    pub error: String,
    pub status: u16,
    /// Raw response body, kept for diagnostics.
    pub payload: serde_json::Value,
}

impl ChatApiError {
    pub fn new(error: impl Into<String>, status: u16, payload: serde_json::Value) -> Self {
        Self {
            error: error.into(),
            status,
            payload,
        }
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Api(#[from] ChatApiError),
    /// The request never got an answer. Not a Slack-side rejection.
    #[error("Sending Slack message")]
    Transport(#[source] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReceipt {
    pub channel: String,
    pub ts: String,
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, channel: &str, text: &str) -> Result<MessageReceipt, SendError>;
}

/// Posts plain-text messages with `chat.postMessage` using a bot token.
pub struct SlackSender {
    http: reqwest::Client,
    endpoint: Url,
    token: Token,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SlackSender {
    pub fn new(cfg: &SlackConfig) -> Result<Self> {
        let token = cfg.token()?.clone();
        let mut base = Url::parse(&cfg.api_url)
            .with_context(|| format!("Invalid Slack API URL '{}'", cfg.api_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("chat.postMessage")
            .context("Building chat.postMessage URL")?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("relnotes/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Building HTTP client")?;
        Ok(Self { http, endpoint, token })
    }
}

#[async_trait]
impl NotificationSender for SlackSender {
    async fn send(&self, channel: &str, text: &str) -> Result<MessageReceipt, SendError> {
        let payload = serde_json::json!({ "channel": channel, "text": text });
        tracing::debug!(url = %self.endpoint, channel, "POST chat.postMessage");
        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(self.token.expose())
            .json(&payload)
            .send()
            .await
            .map_err(SendError::Transport)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(SendError::Transport)?;
        Ok(interpret_response(status, &body)?)
    }
}

/// Map a `chat.postMessage` HTTP answer to a receipt or a [`ChatApiError`].
fn interpret_response(status: u16, body: &[u8]) -> Result<MessageReceipt, ChatApiError> {
    let payload: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) => serde_json::Value::String(String::from_utf8_lossy(body).into_owned()),
    };
    if !(200..300).contains(&status) {
        let error = payload
            .get("error")
            .and_then(|e| e.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("http_{status}"));
        return Err(ChatApiError::new(error, status, payload));
    }
    let parsed: PostMessageResponse = match serde_json::from_value(payload.clone()) {
        Ok(p) => p,
        Err(_) => return Err(ChatApiError::new("invalid_response", status, payload)),
    };
    if !parsed.ok {
        let error = parsed.error.unwrap_or_else(|| "unknown_error".to_string());
        return Err(ChatApiError::new(error, status, payload));
    }
    Ok(MessageReceipt {
        channel: parsed.channel.unwrap_or_default(),
        ts: parsed.ts.unwrap_or_default(),
    })
}
