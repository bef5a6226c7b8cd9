//! # Context Sync
//!
//! Incremental synchronization of a local directory tree to a remote
//! content store as content-addressed blobs, plus retrieval of semantically
//! relevant snippets from that store.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────┐   ┌──────────────┐   ┌────────────┐
//! │ Discovery │──▶│ Chunker │──▶│  SyncEngine  │──▶│   Remote   │
//! │ classify+ │   │  blobs  │   │ diff+upload  │   │ blob store │
//! │  decode   │   └─────────┘   └──────┬───────┘   └─────┬──────┘
//! └───────────┘                        │                 │
//!                              ┌───────▼──────┐   ┌──────▼──────┐
//!                              │   Manifest   │   │  Retrieval  │
//!                              │ (persisted)  │   │   client    │
//!                              └──────────────┘   └─────────────┘
//! ```
//!
//! A search request always triggers a synchronization pass first, so the
//! manifest is refreshed before every query. Re-running on an unchanged
//! tree uploads nothing: blob ids are content-addressed and deduplicated
//! against the persisted manifest.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Blobs, pass results, upload strategy |
//! | [`classify`] | Path eligibility rules |
//! | [`content`] | Encoding-tolerant file reading |
//! | [`chunk`] | Line-boundary chunking |
//! | [`manifest`] | Persisted manifest of uploaded blob ids |
//! | [`sync`] | The synchronization engine |
//! | [`remote`] | HTTP client for the remote store |
//! | [`retry`] | Retry, backoff, and error classification |
//! | [`search`] | Sync-then-query retrieval client |

pub mod chunk;
pub mod classify;
pub mod config;
pub mod content;
pub mod manifest;
pub mod models;
pub mod remote;
pub mod retry;
pub mod search;
pub mod sync;
