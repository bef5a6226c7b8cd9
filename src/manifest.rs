//! Persisted manifest of blob ids known to the remote store.
//!
//! The manifest is a JSON array of id strings kept in the project's data
//! directory. Every id in it corresponds to a blob that was, at some point,
//! accepted by the remote store. It is loaded at the start of each pass,
//! extended only with server-confirmed ids, and rewritten after every
//! confirmed batch so a crash mid-run never loses uploaded progress.
//!
//! A missing or unparsable manifest loads as empty — that forces a safe
//! full re-sync on the next pass instead of a crash.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// Name of the tool's data directory inside the project root. Excluded from
/// the project's own traversal by the classifier.
pub const DATA_DIR: &str = ".context-sync";

const MANIFEST_FILE: &str = "manifest.json";

/// Pure persistence boundary for the manifest; no business logic.
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(project_root: &Path) -> Self {
        Self {
            path: project_root.join(DATA_DIR).join(MANIFEST_FILE),
        }
    }

    /// Location of the persisted manifest file.
    pub fn manifest_path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest, returning an empty baseline when the file is
    /// missing, unreadable, or corrupt.
    pub fn load(&self) -> Vec<String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "manifest unparsable, starting from empty baseline"
                );
                Vec::new()
            }
        }
    }

    /// Overwrite the manifest atomically: a concurrent reader observes
    /// either the old or the new content, never a partial write.
    pub fn save(&self, ids: &[String]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .context("manifest path has no parent directory")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create data dir: {}", dir.display()))?;

        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_string(ids).context("failed to serialize manifest")?;
        fs::write(&tmp, body)
            .with_context(|| format!("failed to write manifest: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace manifest: {}", self.path.display()))?;
        Ok(())
    }
}
