//! HTTP client for the remote content store.
//!
//! Two endpoints are spoken here: `POST {base}/batch-upload` for pushing
//! blob batches and `POST {base}/agents/codebase-retrieval` for querying
//! indexed context. Both carry a bearer token and share the retry and
//! classification discipline from [`crate::retry`].
//!
//! The [`RemoteStore`] trait is the seam the sync engine and retrieval
//! client depend on; tests substitute an in-memory implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, TOKEN_ENV};
use crate::models::Blob;
use crate::retry::{classify_status, classify_transport, with_retry, RemoteError};

/// Remote content store operations used by the pipeline.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload one batch of blobs. Returns the ids the server accepted,
    /// which are authoritative and may be reordered or deduplicated
    /// relative to the request.
    async fn upload_batch(
        &self,
        blobs: &[Blob],
        timeout: Duration,
    ) -> Result<Vec<String>, RemoteError>;

    /// Query the store for context relevant to `query`, scoped to the
    /// given manifest ids.
    async fn retrieve(&self, query: &str, manifest_ids: &[String]) -> Result<String, RemoteError>;
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    blobs: Vec<BlobPayload<'a>>,
}

#[derive(Serialize)]
struct BlobPayload<'a> {
    path: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct UploadResponse {
    blob_names: Vec<String>,
}

#[derive(Serialize)]
struct RetrievalRequest<'a> {
    information_request: &'a str,
    blobs: BlobsState<'a>,
    dialog: Vec<serde_json::Value>,
    max_output_length: u32,
    disable_codebase_retrieval: bool,
    enable_commit_retrieval: bool,
}

#[derive(Serialize)]
struct BlobsState<'a> {
    checkpoint_id: Option<&'a str>,
    added_blobs: &'a [String],
    deleted_blobs: Vec<String>,
}

#[derive(Deserialize)]
struct RetrievalResponse {
    #[serde(default)]
    formatted_retrieval: Option<String>,
}

/// Reqwest-backed implementation of [`RemoteStore`].
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
    max_attempts: u32,
    base_delay: Duration,
    retrieval_timeout: Duration,
}

impl HttpRemoteStore {
    /// Build a client from configuration.
    ///
    /// A missing bearer token is caught here, before any network call.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let token = config.token().ok_or_else(|| {
            anyhow::anyhow!("no API token: set {} or remote.token in the config", TOKEN_ENV)
        })?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: config.remote.base_url.trim_end_matches('/').to_string(),
            token,
            max_attempts: config.upload.max_attempts,
            base_delay: Duration::from_millis(config.upload.base_delay_ms),
            retrieval_timeout: Duration::from_secs(config.retrieval.timeout_secs),
        })
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upload_batch(
        &self,
        blobs: &[Blob],
        timeout: Duration,
    ) -> Result<Vec<String>, RemoteError> {
        let url = format!("{}/batch-upload", self.base_url);
        let payload = UploadRequest {
            blobs: blobs
                .iter()
                .map(|b| BlobPayload {
                    path: &b.path,
                    content: &b.content,
                })
                .collect(),
        };

        let response: UploadResponse =
            with_retry("batch-upload", self.max_attempts, self.base_delay, || {
                let request = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .timeout(timeout)
                    .json(&payload);
                async move {
                    let resp = request.send().await.map_err(|e| classify_transport(&e))?;
                    let status = resp.status();
                    if !status.is_success() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(classify_status(status, &body));
                    }
                    resp.json().await.map_err(|e| {
                        RemoteError::Other(format!("malformed upload response: {}", e))
                    })
                }
            })
            .await?;

        debug!(
            sent = blobs.len(),
            accepted = response.blob_names.len(),
            "batch accepted"
        );
        Ok(response.blob_names)
    }

    async fn retrieve(&self, query: &str, manifest_ids: &[String]) -> Result<String, RemoteError> {
        let url = format!("{}/agents/codebase-retrieval", self.base_url);
        let payload = RetrievalRequest {
            information_request: query,
            blobs: BlobsState {
                checkpoint_id: None,
                added_blobs: manifest_ids,
                deleted_blobs: Vec::new(),
            },
            dialog: Vec::new(),
            max_output_length: 0,
            disable_codebase_retrieval: false,
            enable_commit_retrieval: false,
        };

        let response: RetrievalResponse =
            with_retry("codebase-retrieval", self.max_attempts, self.base_delay, || {
                let request = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.token)
                    .timeout(self.retrieval_timeout)
                    .json(&payload);
                async move {
                    let resp = request.send().await.map_err(|e| classify_transport(&e))?;
                    let status = resp.status();
                    if !status.is_success() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(classify_status(status, &body));
                    }
                    resp.json().await.map_err(|e| {
                        RemoteError::Other(format!("malformed retrieval response: {}", e))
                    })
                }
            })
            .await?;

        Ok(response.formatted_retrieval.unwrap_or_default())
    }
}
