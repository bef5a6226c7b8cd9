//! # Context Sync CLI (`ctxs`)
//!
//! Thin command-line front end over the library. Two commands:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxs sync` | Run one synchronization pass and print the result |
//! | `ctxs search "<query>"` | Sync, then query the store for relevant context |
//!
//! ```bash
//! export CONTEXT_SYNC_TOKEN=...
//! ctxs --config ./ctxs.toml sync --root .
//! ctxs --config ./ctxs.toml search "where is retry backoff implemented?"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use context_sync::config::load_config;
use context_sync::models::IndexStatus;
use context_sync::remote::HttpRemoteStore;
use context_sync::search::RetrievalClient;
use context_sync::sync::SyncEngine;

#[derive(Parser)]
#[command(
    name = "ctxs",
    about = "Incremental codebase sync and context retrieval against a remote blob store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./ctxs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize the project tree to the remote store.
    ///
    /// Discovers eligible files, chunks them into content-addressed blobs,
    /// and uploads only what the persisted manifest does not already have.
    Sync {
        /// Project root to index.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Search the indexed project for relevant context.
    ///
    /// Always runs a synchronization pass first so results reflect the
    /// current on-disk state.
    Search {
        /// The information request to send to the store.
        query: String,

        /// Project root to index and search.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let remote = Arc::new(HttpRemoteStore::new(&config)?);

    match cli.command {
        Commands::Sync { root } => {
            let engine = SyncEngine::new(&config, &root, remote);
            let result = engine.synchronize().await?;

            println!("sync {}", root.display());
            println!("  status:   {}", status_label(result.status));
            println!("  message:  {}", result.message);
            println!("  total:    {}", result.total_blobs);
            println!("  existing: {}", result.existing_blobs);
            println!("  new:      {}", result.new_blobs);
            if result.failed_blobs > 0 {
                println!("  failed:   {}", result.failed_blobs);
            }
            if result.status == IndexStatus::Error {
                std::process::exit(1);
            }
        }
        Commands::Search { query, root } => {
            let client = RetrievalClient::new(&config, remote);
            let text = client.search_context(&root, &query).await?;
            println!("{}", text);
        }
    }

    Ok(())
}

fn status_label(status: IndexStatus) -> &'static str {
    match status {
        IndexStatus::Success => "success",
        IndexStatus::PartialSuccess => "partial_success",
        IndexStatus::Error => "error",
    }
}
