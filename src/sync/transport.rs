//! Wire boundary to the sync server.
//!
//! The engine only depends on [`SyncTransport`]; [`HttpTransport`] is the
//! JSON-over-HTTP implementation used by the CLI. Every call may fail with
//! `Error::Transport`, which the engine treats like a per-item error for
//! everything the call covered.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{ChangeOperation, Note, PendingChange};

/// Default per-request timeout for [`HttpTransport`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Batch of queued changes sent in one push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub device_id: String,
    pub changes: Vec<PendingChange>,
}

/// A change the server took, with its new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedChange {
    pub note_id: String,
    pub server_version: i64,
    pub server_sequence: i64,
}

/// A change the server refused because its copy moved on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictedChange {
    pub note_id: String,
    pub server_version: i64,
    /// Server copy; `None` when the server side is a deletion
    #[serde(default)]
    pub server_note: Option<Note>,
}

/// A change the server could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedChange {
    pub note_id: String,
    pub error: String,
    #[serde(default)]
    pub retryable: bool,
}

/// Per-item verdicts for a push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    #[serde(default)]
    pub accepted: Vec<AcceptedChange>,
    #[serde(default)]
    pub conflicts: Vec<ConflictedChange>,
    #[serde(default)]
    pub errors: Vec<RejectedChange>,
}

/// Request for remote changes after a sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub device_id: String,
    pub since_sequence: i64,
}

/// One entry of the server's change stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerChange {
    pub sequence: i64,
    pub note_id: String,
    pub operation: ChangeOperation,
    /// Note body for create/update
    #[serde(default)]
    pub note: Option<Note>,
    pub version: i64,
}

/// One page of the change stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    #[serde(default)]
    pub changes: Vec<ServerChange>,
    #[serde(default)]
    pub has_more: bool,
    pub latest_sequence: i64,
    pub server_time: i64,
}

/// Reachability probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub ok: bool,
    pub server_time: i64,
}

/// Trait for sync servers.
///
/// Implementations own their timeouts; the engine never cancels a call.
pub trait SyncTransport: Send + Sync {
    /// Send queued changes and get a verdict for each.
    fn push(&self, request: PushRequest) -> impl std::future::Future<Output = Result<PushResponse>> + Send;

    /// Fetch one page of remote changes.
    fn pull(&self, request: PullRequest) -> impl std::future::Future<Output = Result<PullResponse>> + Send;

    /// Check that the server is reachable.
    fn check_status(&self) -> impl std::future::Future<Output = Result<ServerStatus>> + Send;
}

/// JSON over HTTP(S) transport.
///
/// Endpoints are `POST {base}/sync/push`, `POST {base}/sync/pull`, and
/// `GET {base}/sync/status`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    device_id: String,
}

impl HttpTransport {
    /// Create a transport with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: Option<String>, device_id: &str) -> Result<Self> {
        Self::with_timeout(base_url, api_key, device_id, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(
        base_url: &str,
        api_key: Option<String>,
        device_id: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            device_id: device_id.to_string(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self
            .client
            .request(method, url)
            .header("X-Device-Id", &self.device_id);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn send<R: serde::de::DeserializeOwned>(
        &self,
        what: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<R> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{what} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("{what} failed with HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse {what} response: {e}")))
    }
}

impl SyncTransport for HttpTransport {
    async fn push(&self, request: PushRequest) -> Result<PushResponse> {
        debug!(changes = request.changes.len(), "POST /sync/push");
        let builder = self.request(reqwest::Method::POST, "/sync/push").json(&request);
        self.send("Push", builder).await
    }

    async fn pull(&self, request: PullRequest) -> Result<PullResponse> {
        debug!(since = request.since_sequence, "POST /sync/pull");
        let builder = self.request(reqwest::Method::POST, "/sync/pull").json(&request);
        self.send("Pull", builder).await
    }

    async fn check_status(&self) -> Result<ServerStatus> {
        let builder = self.request(reqwest::Method::GET, "/sync/status");
        self.send("Status", builder).await
    }
}
