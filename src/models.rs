//! Core data types used throughout the sync and retrieval pipeline.
//!
//! These types represent the content-addressed blobs that flow to the remote
//! store, the per-pass outcome contract, and the adaptive upload policy.

use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A content-addressed unit of text submitted to the remote store: either a
/// whole file or one line-bounded chunk of a large file.
///
/// The `id` is a SHA-256 digest over `(path, content)`. Two blobs with the
/// same path and byte content always produce the same id; any change to
/// either produces a different id. The id — not the path alone — is the unit
/// of deduplication, so renames and edits are both detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Project-relative path, or `path#chunk{i}of{n}` for a split segment.
    pub path: String,
    /// Raw decoded text of the segment.
    pub content: String,
    /// Hex-encoded SHA-256 digest over path and content.
    pub id: String,
}

impl Blob {
    pub fn new(path: String, content: String) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        let id = format!("{:x}", hasher.finalize());

        Self { path, content, id }
    }
}

/// Terminal status of one synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Success,
    PartialSuccess,
    Error,
}

/// Outcome contract returned by [`SyncEngine::synchronize`].
///
/// Invariant: `total_blobs == existing_blobs + new_blobs` whenever the
/// status is not [`IndexStatus::Error`]. `failed_blobs` counts blobs still
/// pending when the pass ended; it is never folded into `total_blobs`.
///
/// [`SyncEngine::synchronize`]: crate::sync::SyncEngine::synchronize
#[derive(Debug, Clone, Serialize)]
pub struct IndexResult {
    pub status: IndexStatus,
    pub message: String,
    pub total_blobs: usize,
    pub existing_blobs: usize,
    pub new_blobs: usize,
    pub failed_blobs: usize,
}

impl IndexResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: IndexStatus::Error,
            message: message.into(),
            total_blobs: 0,
            existing_blobs: 0,
            new_blobs: 0,
            failed_blobs: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == IndexStatus::Error
    }
}

/// Policy selecting batch size, concurrency, and per-request timeout as a
/// function of the number of pending blobs.
///
/// All three parameters are monotonically non-decreasing in the pending
/// count: small projects get conservative single-worker batches, very large
/// projects get maximal batching and parallelism. This bounds round-trip
/// overhead for small jobs and socket/memory pressure for large ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadStrategy {
    pub batch_size: usize,
    pub concurrency: usize,
    pub timeout: Duration,
}

/// Floor applied when batch size is halved between upload rounds.
pub const MIN_BATCH_SIZE: usize = 5;

impl UploadStrategy {
    pub fn for_pending(pending: usize) -> Self {
        match pending {
            0..=10 => Self {
                batch_size: 5,
                concurrency: 1,
                timeout: Duration::from_secs(30),
            },
            11..=100 => Self {
                batch_size: 20,
                concurrency: 2,
                timeout: Duration::from_secs(60),
            },
            101..=1000 => Self {
                batch_size: 40,
                concurrency: 4,
                timeout: Duration::from_secs(90),
            },
            _ => Self {
                batch_size: 80,
                concurrency: 8,
                timeout: Duration::from_secs(120),
            },
        }
    }
}
