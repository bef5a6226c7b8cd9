//! Context retrieval against the remote store.
//!
//! Every search is preceded by a full synchronization pass so the manifest
//! reflects the current on-disk state; the query itself is stateless given
//! the manifest. Deletions are never reported — the full manifest is sent
//! as the "added" set and the store's own eventual consistency handles the
//! rest.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::info;

use crate::config::Config;
use crate::manifest::ManifestStore;
use crate::remote::RemoteStore;
use crate::sync::SyncEngine;

/// Message returned when the store has nothing relevant to say.
pub const NO_CONTEXT_MESSAGE: &str = "no relevant context found";

/// Sync-then-query client for codebase retrieval.
pub struct RetrievalClient<'a> {
    config: &'a Config,
    remote: Arc<dyn RemoteStore>,
}

impl<'a> RetrievalClient<'a> {
    pub fn new(config: &'a Config, remote: Arc<dyn RemoteStore>) -> Self {
        Self { config, remote }
    }

    /// Synchronize `project_root` and query the remote store for context
    /// relevant to `query`.
    ///
    /// Argument problems are local validation errors; no network call is
    /// attempted for them. A failed synchronization pass propagates its
    /// message without querying.
    pub async fn search_context(&self, project_root: &Path, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            bail!("query must not be empty");
        }
        if !project_root.is_dir() {
            bail!(
                "project root is not a readable directory: {}",
                project_root.display()
            );
        }

        let engine = SyncEngine::new(self.config, project_root, Arc::clone(&self.remote));
        let result = engine.synchronize().await?;
        if result.is_error() {
            bail!("indexing failed: {}", result.message);
        }
        info!(
            status = ?result.status,
            total = result.total_blobs,
            new = result.new_blobs,
            "index refreshed before retrieval"
        );

        let manifest_ids = ManifestStore::new(project_root).load();
        let text = self
            .remote
            .retrieve(query, &manifest_ids)
            .await
            .map_err(|e| anyhow::anyhow!("retrieval failed: {}", e))?;

        if text.trim().is_empty() {
            return Ok(NO_CONTEXT_MESSAGE.to_string());
        }
        Ok(text)
    }
}
