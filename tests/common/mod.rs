//! Shared fixtures: an in-memory remote store and a ready-made config.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use context_sync::config::{ChunkingConfig, Config, RemoteConfig, RetrievalConfig, UploadConfig};
use context_sync::models::Blob;
use context_sync::remote::RemoteStore;
use context_sync::retry::RemoteError;

/// Scripted failure modes for [`MockRemote`].
pub enum Behavior {
    AcceptAll,
    /// Soft-fail any batch containing a path with this substring.
    RejectPathsContaining(&'static str),
    /// Soft-fail the first N upload calls, then accept everything.
    SoftFailFirst(usize),
    /// Fatal 401 on every upload.
    FatalAuth,
}

pub struct MockRemote {
    behavior: Behavior,
    pub upload_calls: AtomicUsize,
    pub retrieve_calls: AtomicUsize,
    pub uploaded_paths: Mutex<Vec<String>>,
    /// Blob count of every upload call, in call order.
    pub batch_sizes: Mutex<Vec<usize>>,
    pub retrieval_text: String,
}

impl MockRemote {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            upload_calls: AtomicUsize::new(0),
            retrieve_calls: AtomicUsize::new(0),
            uploaded_paths: Mutex::new(Vec::new()),
            batch_sizes: Mutex::new(Vec::new()),
            retrieval_text: String::new(),
        }
    }

    pub fn with_retrieval(behavior: Behavior, text: &str) -> Self {
        Self {
            retrieval_text: text.to_string(),
            ..Self::new(behavior)
        }
    }

    pub fn upload_count(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn retrieve_count(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn upload_batch(
        &self,
        blobs: &[Blob],
        _timeout: Duration,
    ) -> Result<Vec<String>, RemoteError> {
        let call = self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(blobs.len());
        match &self.behavior {
            Behavior::AcceptAll => {}
            Behavior::RejectPathsContaining(needle) => {
                if blobs.iter().any(|b| b.path.contains(needle)) {
                    return Err(RemoteError::Network("injected network failure".into()));
                }
            }
            Behavior::SoftFailFirst(n) => {
                if call < *n {
                    return Err(RemoteError::Network("injected transient failure".into()));
                }
            }
            Behavior::FatalAuth => return Err(RemoteError::Auth),
        }
        self.uploaded_paths
            .lock()
            .unwrap()
            .extend(blobs.iter().map(|b| b.path.clone()));
        Ok(blobs.iter().map(|b| b.id.clone()).collect())
    }

    async fn retrieve(
        &self,
        _query: &str,
        _manifest_ids: &[String],
    ) -> Result<String, RemoteError> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.retrieval_text.clone())
    }
}

/// Config pointed at nothing in particular; the mock never dials out.
pub fn test_config() -> Config {
    Config {
        remote: RemoteConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            token: Some("test-token".to_string()),
        },
        chunking: ChunkingConfig {
            max_lines: 800,
            max_file_bytes: 2 * 1024 * 1024,
        },
        upload: UploadConfig {
            max_attempts: 2,
            base_delay_ms: 1,
        },
        retrieval: RetrievalConfig { timeout_secs: 5 },
    }
}
