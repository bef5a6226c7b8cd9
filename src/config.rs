//! TOML configuration parsing and validation.
//!
//! The configuration is constructed once at startup and passed by reference
//! into the engine and client constructors; nothing reads ambient global
//! state after load. The auth token may come from the `CONTEXT_SYNC_TOKEN`
//! environment variable, which overrides the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Environment variable that overrides `remote.token`.
pub const TOKEN_ENV: &str = "CONTEXT_SYNC_TOKEN";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    /// Base URL of the remote content store, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Bearer token; usually supplied via `CONTEXT_SYNC_TOKEN` instead.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum number of lines per uploaded blob.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Files larger than this many bytes are skipped during discovery.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_max_lines() -> usize {
    800
}
fn default_max_file_bytes() -> u64 {
    2 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Attempts per batch request before it becomes a soft failure.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Timeout for the retrieval query, in seconds.
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

fn default_retrieval_timeout_secs() -> u64 {
    120
}

impl Config {
    /// The bearer token, with the environment taking precedence over the
    /// config file.
    pub fn token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.remote.token.clone())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.remote.base_url.is_empty() {
        anyhow::bail!("remote.base_url must not be empty");
    }
    if config.chunking.max_lines == 0 {
        anyhow::bail!("chunking.max_lines must be > 0");
    }
    if config.upload.max_attempts == 0 {
        anyhow::bail!("upload.max_attempts must be > 0");
    }
    if config.retrieval.timeout_secs == 0 {
        anyhow::bail!("retrieval.timeout_secs must be > 0");
    }

    Ok(config)
}
