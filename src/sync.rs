//! Synchronization engine: discovery, diffing, and resilient upload.
//!
//! One call to [`SyncEngine::synchronize`] runs the full pass:
//!
//! ```text
//! Discovering → Diffing → (NoUpload | Uploading) → Success | PartialSuccess | Error
//! ```
//!
//! Discovery walks the project tree sequentially, reading and chunking
//! eligible files. Diffing partitions the current blob set against the
//! persisted manifest; only blobs whose id is absent from the manifest are
//! ever sent over the network. Upload proceeds in rounds (at most
//! [`MAX_UPLOAD_ROUNDS`]): a fixed number of workers pull batches from a
//! shared queue, soft failures are requeued into the next round with a
//! halved batch size, and fatal failures stop new dispatch while letting
//! in-flight batches finish. The manifest is rewritten after every
//! confirmed batch, so progress is durable before more risk is taken.
//!
//! The engine owns the manifest for the duration of a pass and is its only
//! writer. Callers must not run two passes for the same project
//! concurrently; that coordination is theirs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunk;
use crate::classify::PathClassifier;
use crate::config::Config;
use crate::content;
use crate::manifest::ManifestStore;
use crate::models::{Blob, IndexResult, IndexStatus, UploadStrategy, MIN_BATCH_SIZE};
use crate::remote::RemoteStore;
use crate::retry::RemoteError;

/// Maximum number of upload rounds per pass.
pub const MAX_UPLOAD_ROUNDS: u32 = 3;

enum BatchOutcome {
    /// Server confirmed these ids.
    Accepted(Vec<String>),
    /// Retries exhausted; the batch goes back in the pool for next round.
    SoftFailure(Vec<Blob>, RemoteError),
    /// Never attempted because a sibling batch failed fatally.
    Skipped(Vec<Blob>),
    Fatal(Vec<Blob>, RemoteError),
}

/// Orchestrates one synchronization pass for a project.
pub struct SyncEngine {
    root: PathBuf,
    max_lines: usize,
    max_file_bytes: u64,
    store: ManifestStore,
    remote: Arc<dyn RemoteStore>,
}

impl SyncEngine {
    pub fn new(config: &Config, project_root: &Path, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            root: project_root.to_path_buf(),
            max_lines: config.chunking.max_lines,
            max_file_bytes: config.chunking.max_file_bytes,
            store: ManifestStore::new(project_root),
            remote,
        }
    }

    /// Location of the persisted manifest for this project.
    pub fn manifest_path(&self) -> &Path {
        self.store.manifest_path()
    }

    /// Run one full pass: discover, diff, upload what is new, persist the
    /// manifest, and classify the outcome.
    ///
    /// Network failures never surface as `Err`; they are folded into the
    /// returned [`IndexResult`]. Only local problems that make the pass
    /// meaningless (unbuildable classifier, manifest write failure) error.
    pub async fn synchronize(&self) -> Result<IndexResult> {
        let blobs = self.discover()?;
        if blobs.is_empty() {
            return Ok(IndexResult::error(format!(
                "no indexable text files found in {}",
                self.root.display()
            )));
        }

        // Diff against the last persisted state. Ids, not paths, are the
        // unit of comparison, so renames and edits both show up as new.
        let manifest: HashSet<String> = self.store.load().into_iter().collect();
        let mut seen = HashSet::new();
        let mut existing: Vec<String> = Vec::new();
        let mut to_upload: Vec<Blob> = Vec::new();
        for blob in blobs {
            if !seen.insert(blob.id.clone()) {
                continue;
            }
            if manifest.contains(&blob.id) {
                existing.push(blob.id);
            } else {
                to_upload.push(blob);
            }
        }

        if to_upload.is_empty() {
            // Prunes ids whose files no longer exist on disk.
            self.store
                .save(&existing)
                .context("failed to persist manifest")?;
            info!(total = existing.len(), "index up to date, nothing to upload");
            return Ok(IndexResult {
                status: IndexStatus::Success,
                message: format!("index up to date ({} blobs)", existing.len()),
                total_blobs: existing.len(),
                existing_blobs: existing.len(),
                new_blobs: 0,
                failed_blobs: 0,
            });
        }

        let strategy = UploadStrategy::for_pending(to_upload.len());
        info!(
            pending = to_upload.len(),
            existing = existing.len(),
            batch_size = strategy.batch_size,
            concurrency = strategy.concurrency,
            "uploading new blobs"
        );

        let outcome = self.upload_rounds(to_upload, strategy, &existing).await?;

        let final_manifest: Vec<String> = existing
            .iter()
            .chain(outcome.accepted.iter())
            .cloned()
            .collect();
        self.store
            .save(&final_manifest)
            .context("failed to persist manifest")?;

        Ok(classify_outcome(existing.len(), outcome))
    }

    /// Walk the project tree, reading and chunking every eligible file.
    ///
    /// Sequential on purpose: local disk is not the bottleneck, the network
    /// is. Individual unreadable entries are skipped, never fatal.
    fn discover(&self) -> Result<Vec<Blob>> {
        let classifier = PathClassifier::new(&self.root)?;
        let mut blobs = Vec::new();

        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| classifier.should_index(e.path(), e.file_type().is_dir()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            if let Ok(meta) = entry.metadata() {
                if meta.len() > self.max_file_bytes {
                    debug!(
                        path = %entry.path().display(),
                        bytes = meta.len(),
                        "skipping oversized file"
                    );
                    continue;
                }
            }

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or_else(|_| entry.path())
                .to_string_lossy()
                .replace('\\', "/");

            let text = match content::read_text(entry.path()) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %relative, error = %e, "skipping unreadable file");
                    continue;
                }
            };

            blobs.extend(chunk::split(&relative, &text, self.max_lines));
        }

        debug!(blobs = blobs.len(), "discovery complete");
        Ok(blobs)
    }

    /// Upload `pending` in rounds with bounded concurrency.
    ///
    /// Workers pull batches from a shared queue; the coordinator persists
    /// the manifest after every accepted batch and collects requeues. Only
    /// manifest write failures return `Err`.
    async fn upload_rounds(
        &self,
        pending: Vec<Blob>,
        strategy: UploadStrategy,
        existing: &[String],
    ) -> Result<UploadOutcome> {
        let mut pending = pending;
        let mut accepted: Vec<String> = Vec::new();
        let mut fatal: Option<RemoteError> = None;
        let mut batch_size = strategy.batch_size.max(1);

        for round in 1..=MAX_UPLOAD_ROUNDS {
            if pending.is_empty() || fatal.is_some() {
                break;
            }
            debug!(
                round,
                pending = pending.len(),
                batch_size,
                "starting upload round"
            );

            let (batch_tx, batch_rx) = flume::unbounded::<Vec<Blob>>();
            for batch in pending.chunks(batch_size) {
                let _ = batch_tx.send(batch.to_vec());
            }
            drop(batch_tx);
            pending = Vec::new();

            let (result_tx, result_rx) = flume::unbounded::<BatchOutcome>();
            let stop = Arc::new(AtomicBool::new(false));

            let mut workers = Vec::new();
            for _ in 0..strategy.concurrency.max(1) {
                let batch_rx = batch_rx.clone();
                let result_tx = result_tx.clone();
                let remote = Arc::clone(&self.remote);
                let stop = Arc::clone(&stop);
                let timeout = strategy.timeout;
                workers.push(tokio::spawn(async move {
                    while let Ok(batch) = batch_rx.recv_async().await {
                        if stop.load(Ordering::SeqCst) {
                            let _ = result_tx.send(BatchOutcome::Skipped(batch));
                            continue;
                        }
                        let outcome = match remote.upload_batch(&batch, timeout).await {
                            Ok(ids) => BatchOutcome::Accepted(ids),
                            Err(e) if e.is_fatal() => {
                                stop.store(true, Ordering::SeqCst);
                                BatchOutcome::Fatal(batch, e)
                            }
                            Err(e) => BatchOutcome::SoftFailure(batch, e),
                        };
                        let _ = result_tx.send(outcome);
                    }
                }));
            }
            drop(batch_rx);
            drop(result_tx);

            let mut save_error: Option<anyhow::Error> = None;
            while let Ok(outcome) = result_rx.recv_async().await {
                match outcome {
                    BatchOutcome::Accepted(ids) => {
                        accepted.extend(ids);
                        if save_error.is_none() {
                            let manifest: Vec<String> = existing
                                .iter()
                                .chain(accepted.iter())
                                .cloned()
                                .collect();
                            if let Err(e) = self.store.save(&manifest) {
                                // Losing track of uploaded ids would cause
                                // duplicate work next pass; stop taking risk.
                                stop.store(true, Ordering::SeqCst);
                                save_error = Some(e);
                            }
                        }
                    }
                    BatchOutcome::SoftFailure(batch, e) => {
                        warn!(
                            round,
                            blobs = batch.len(),
                            error = %e,
                            "batch failed, requeued for next round"
                        );
                        pending.extend(batch);
                    }
                    BatchOutcome::Skipped(batch) => pending.extend(batch),
                    BatchOutcome::Fatal(batch, e) => {
                        warn!(round, error = %e, "fatal error, halting upload rounds");
                        pending.extend(batch);
                        if fatal.is_none() {
                            fatal = Some(e);
                        }
                    }
                }
            }
            for worker in workers {
                let _ = worker.await;
            }
            if let Some(e) = save_error {
                return Err(e.context("failed to persist manifest during upload"));
            }

            // Trade throughput for reliability as failures recur.
            batch_size = (batch_size / 2).max(MIN_BATCH_SIZE);
        }

        Ok(UploadOutcome {
            accepted,
            pending,
            fatal,
        })
    }
}

struct UploadOutcome {
    accepted: Vec<String>,
    pending: Vec<Blob>,
    fatal: Option<RemoteError>,
}

fn classify_outcome(existing: usize, outcome: UploadOutcome) -> IndexResult {
    let accepted = outcome.accepted.len();
    let failed = outcome.pending.len();
    let total = existing + accepted;

    if let Some(fatal) = outcome.fatal {
        if total == 0 {
            return IndexResult {
                failed_blobs: failed,
                ..IndexResult::error(fatal.to_string())
            };
        }
        return IndexResult {
            status: IndexStatus::PartialSuccess,
            message: format!("indexing halted: {} ({} blobs not uploaded)", fatal, failed),
            total_blobs: total,
            existing_blobs: existing,
            new_blobs: accepted,
            failed_blobs: failed,
        };
    }

    if failed > 0 {
        if total == 0 {
            return IndexResult {
                failed_blobs: failed,
                ..IndexResult::error("all uploads failed")
            };
        }
        return IndexResult {
            status: IndexStatus::PartialSuccess,
            message: format!(
                "indexed {} blobs ({} new), {} failed to upload",
                total, accepted, failed
            ),
            total_blobs: total,
            existing_blobs: existing,
            new_blobs: accepted,
            failed_blobs: failed,
        };
    }

    info!(total, new = accepted, existing, "synchronization complete");
    IndexResult {
        status: IndexStatus::Success,
        message: format!("indexed {} blobs ({} new, {} existing)", total, accepted, existing),
        total_blobs: total,
        existing_blobs: existing,
        new_blobs: accepted,
        failed_blobs: 0,
    }
}
