//! End-to-end synchronization passes against an in-memory remote store.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use common::{test_config, Behavior, MockRemote};
use context_sync::manifest::ManifestStore;
use context_sync::models::IndexStatus;
use context_sync::sync::SyncEngine;

fn write_project(root: &Path) {
    fs::write(root.join("a.rs"), "fn a() {}\nfn b() {}\n").unwrap();
    fs::write(root.join("b.md"), "# Notes\n\nSome documentation.\n").unwrap();
    let big: String = (0..2500).map(|i| format!("line {}\n", i)).collect();
    fs::write(root.join("big.py"), big).unwrap();
}

#[tokio::test]
async fn test_first_run_uploads_everything() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let config = test_config();
    let remote = Arc::new(MockRemote::new(Behavior::AcceptAll));

    let engine = SyncEngine::new(&config, tmp.path(), remote.clone());
    let result = engine.synchronize().await.unwrap();

    // 2 single-blob files + ceil(2500/800) = 4 chunks for big.py.
    assert_eq!(result.status, IndexStatus::Success);
    assert_eq!(result.total_blobs, 6);
    assert_eq!(result.new_blobs, 6);
    assert_eq!(result.existing_blobs, 0);
    assert_eq!(result.failed_blobs, 0);

    let uploaded = remote.uploaded_paths.lock().unwrap().clone();
    assert_eq!(uploaded.len(), 6);
    assert!(uploaded.contains(&"a.rs".to_string()));
    assert!(uploaded.contains(&"big.py#chunk1of4".to_string()));
    assert!(uploaded.contains(&"big.py#chunk4of4".to_string()));

    assert_eq!(ManifestStore::new(tmp.path()).load().len(), 6);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let config = test_config();

    let first = Arc::new(MockRemote::new(Behavior::AcceptAll));
    SyncEngine::new(&config, tmp.path(), first)
        .synchronize()
        .await
        .unwrap();

    let second = Arc::new(MockRemote::new(Behavior::AcceptAll));
    let result = SyncEngine::new(&config, tmp.path(), second.clone())
        .synchronize()
        .await
        .unwrap();

    assert_eq!(result.status, IndexStatus::Success);
    assert_eq!(result.new_blobs, 0);
    assert_eq!(result.existing_blobs, 6);
    assert_eq!(second.upload_count(), 0);
}

#[tokio::test]
async fn test_edit_uploads_only_changed_file() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let config = test_config();

    SyncEngine::new(&config, tmp.path(), Arc::new(MockRemote::new(Behavior::AcceptAll)))
        .synchronize()
        .await
        .unwrap();

    fs::write(tmp.path().join("a.rs"), "fn a() { changed(); }\n").unwrap();
    let remote = Arc::new(MockRemote::new(Behavior::AcceptAll));
    let result = SyncEngine::new(&config, tmp.path(), remote.clone())
        .synchronize()
        .await
        .unwrap();

    assert_eq!(result.status, IndexStatus::Success);
    assert_eq!(result.new_blobs, 1);
    assert_eq!(result.existing_blobs, 5);
    let uploaded = remote.uploaded_paths.lock().unwrap().clone();
    assert_eq!(uploaded, vec!["a.rs".to_string()]);
}

#[tokio::test]
async fn test_deleted_file_is_pruned_from_manifest() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let config = test_config();

    SyncEngine::new(&config, tmp.path(), Arc::new(MockRemote::new(Behavior::AcceptAll)))
        .synchronize()
        .await
        .unwrap();
    assert_eq!(ManifestStore::new(tmp.path()).load().len(), 6);

    fs::remove_file(tmp.path().join("b.md")).unwrap();
    let remote = Arc::new(MockRemote::new(Behavior::AcceptAll));
    let result = SyncEngine::new(&config, tmp.path(), remote.clone())
        .synchronize()
        .await
        .unwrap();

    assert_eq!(result.status, IndexStatus::Success);
    assert_eq!(result.new_blobs, 0);
    assert_eq!(result.existing_blobs, 5);
    assert_eq!(remote.upload_count(), 0);
    assert_eq!(ManifestStore::new(tmp.path()).load().len(), 5);
}

#[tokio::test]
async fn test_empty_project_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let config = test_config();
    let remote = Arc::new(MockRemote::new(Behavior::AcceptAll));

    let result = SyncEngine::new(&config, tmp.path(), remote.clone())
        .synchronize()
        .await
        .unwrap();

    assert_eq!(result.status, IndexStatus::Error);
    assert!(result.message.contains("no indexable text files"));
    assert_eq!(remote.upload_count(), 0);
}

#[tokio::test]
async fn test_excluded_directories_are_not_indexed() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("keep.rs"), "fn keep() {}\n").unwrap();
    fs::create_dir_all(tmp.path().join("node_modules/pkg")).unwrap();
    fs::write(tmp.path().join("node_modules/pkg/index.js"), "dropped\n").unwrap();
    fs::create_dir_all(tmp.path().join("target")).unwrap();
    fs::write(tmp.path().join("target/out.rs"), "dropped\n").unwrap();

    let config = test_config();
    let remote = Arc::new(MockRemote::new(Behavior::AcceptAll));
    let result = SyncEngine::new(&config, tmp.path(), remote.clone())
        .synchronize()
        .await
        .unwrap();

    assert_eq!(result.total_blobs, 1);
    let uploaded = remote.uploaded_paths.lock().unwrap().clone();
    assert_eq!(uploaded, vec!["keep.rs".to_string()]);
}

#[tokio::test]
async fn test_partial_failure_keeps_progress() {
    let tmp = TempDir::new().unwrap();
    for i in 0..5 {
        fs::write(
            tmp.path().join(format!("f{}.rs", i)),
            format!("fn f{}() {{}}\n", i),
        )
        .unwrap();
    }
    fs::write(tmp.path().join("bad.rs"), "fn bad() {}\n").unwrap();

    let config = test_config();
    let remote = Arc::new(MockRemote::new(Behavior::RejectPathsContaining("bad.rs")));
    let result = SyncEngine::new(&config, tmp.path(), remote.clone())
        .synchronize()
        .await
        .unwrap();

    assert_eq!(result.status, IndexStatus::PartialSuccess);
    assert!(result.failed_blobs > 0);
    assert_eq!(result.new_blobs + result.failed_blobs, 6);
    assert_eq!(result.total_blobs, result.existing_blobs + result.new_blobs);
    // Confirmed ids were persisted even though the pass did not finish clean.
    assert_eq!(ManifestStore::new(tmp.path()).load().len(), result.new_blobs);
}

#[tokio::test]
async fn test_failed_blobs_recover_on_next_pass() {
    let tmp = TempDir::new().unwrap();
    for i in 0..5 {
        fs::write(
            tmp.path().join(format!("f{}.rs", i)),
            format!("fn f{}() {{}}\n", i),
        )
        .unwrap();
    }
    fs::write(tmp.path().join("bad.rs"), "fn bad() {}\n").unwrap();
    let config = test_config();

    let flaky = Arc::new(MockRemote::new(Behavior::RejectPathsContaining("bad.rs")));
    let first = SyncEngine::new(&config, tmp.path(), flaky)
        .synchronize()
        .await
        .unwrap();
    assert_eq!(first.status, IndexStatus::PartialSuccess);

    let healthy = Arc::new(MockRemote::new(Behavior::AcceptAll));
    let second = SyncEngine::new(&config, tmp.path(), healthy)
        .synchronize()
        .await
        .unwrap();

    assert_eq!(second.status, IndexStatus::Success);
    assert_eq!(second.new_blobs, first.failed_blobs);
    assert_eq!(second.total_blobs, 6);
    assert_eq!(ManifestStore::new(tmp.path()).load().len(), 6);
}

#[tokio::test]
async fn test_soft_failed_batch_succeeds_next_round() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let config = test_config();
    let remote = Arc::new(MockRemote::new(Behavior::SoftFailFirst(1)));

    let result = SyncEngine::new(&config, tmp.path(), remote.clone())
        .synchronize()
        .await
        .unwrap();

    // 6 pending at batch size 5 means two batches in round one. The first
    // soft-fails and is requeued; round two retries it and succeeds, so the
    // pass as a whole is clean.
    assert_eq!(result.status, IndexStatus::Success);
    assert_eq!(result.new_blobs, 6);
    assert_eq!(result.failed_blobs, 0);
    assert_eq!(remote.upload_count(), 3);
    assert_eq!(ManifestStore::new(tmp.path()).load().len(), 6);
}

#[tokio::test]
async fn test_batch_size_shrinks_between_rounds() {
    let tmp = TempDir::new().unwrap();
    for i in 0..30 {
        fs::write(
            tmp.path().join(format!("m{:02}.rs", i)),
            format!("fn m{}() {{}}\n", i),
        )
        .unwrap();
    }
    let config = test_config();
    let remote = Arc::new(MockRemote::new(Behavior::SoftFailFirst(2)));

    let result = SyncEngine::new(&config, tmp.path(), remote.clone())
        .synchronize()
        .await
        .unwrap();

    assert_eq!(result.status, IndexStatus::Success);
    assert_eq!(result.new_blobs, 30);

    // 30 pending: round one sends 20 + 10 and both soft-fail; round two
    // resends everything with the batch size halved to 10.
    let mut sizes = remote.batch_sizes.lock().unwrap().clone();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![10, 10, 10, 10, 20]);
}

#[tokio::test]
async fn test_fatal_auth_halts_dispatch() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let config = test_config();
    let remote = Arc::new(MockRemote::new(Behavior::FatalAuth));

    let result = SyncEngine::new(&config, tmp.path(), remote.clone())
        .synchronize()
        .await
        .unwrap();

    // No prior progress, nothing accepted: the whole pass is an error.
    assert_eq!(result.status, IndexStatus::Error);
    assert!(result.message.contains("authentication"));
    // 6 pending at batch size 5 means two batches in round one; the first
    // fatal stops the second from being attempted, and no further rounds run.
    assert_eq!(remote.upload_count(), 1);
}

#[tokio::test]
async fn test_fatal_auth_preserves_existing_progress() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let config = test_config();

    SyncEngine::new(&config, tmp.path(), Arc::new(MockRemote::new(Behavior::AcceptAll)))
        .synchronize()
        .await
        .unwrap();

    fs::write(tmp.path().join("a.rs"), "fn a() { edited(); }\n").unwrap();
    let remote = Arc::new(MockRemote::new(Behavior::FatalAuth));
    let result = SyncEngine::new(&config, tmp.path(), remote)
        .synchronize()
        .await
        .unwrap();

    assert_eq!(result.status, IndexStatus::PartialSuccess);
    assert_eq!(result.existing_blobs, 5);
    assert_eq!(result.failed_blobs, 1);
    // The pre-existing ids survive in the manifest.
    assert_eq!(ManifestStore::new(tmp.path()).load().len(), 5);
}

#[tokio::test]
async fn test_gitignore_rules_apply() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".gitignore"), "secret/\n").unwrap();
    fs::create_dir_all(tmp.path().join("secret")).unwrap();
    fs::write(tmp.path().join("secret/keys.rs"), "dropped\n").unwrap();
    fs::write(tmp.path().join("main.rs"), "fn main() {}\n").unwrap();

    let config = test_config();
    let remote = Arc::new(MockRemote::new(Behavior::AcceptAll));
    let result = SyncEngine::new(&config, tmp.path(), remote.clone())
        .synchronize()
        .await
        .unwrap();

    assert_eq!(result.total_blobs, 1);
    let uploaded = remote.uploaded_paths.lock().unwrap().clone();
    assert_eq!(uploaded, vec!["main.rs".to_string()]);
}

#[tokio::test]
async fn test_manifest_lives_outside_the_index() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let config = test_config();

    // Two passes: the second must not index the manifest the first wrote.
    SyncEngine::new(&config, tmp.path(), Arc::new(MockRemote::new(Behavior::AcceptAll)))
        .synchronize()
        .await
        .unwrap();
    let result = SyncEngine::new(&config, tmp.path(), Arc::new(MockRemote::new(Behavior::AcceptAll)))
        .synchronize()
        .await
        .unwrap();

    assert_eq!(result.total_blobs, 6);
    assert_eq!(result.new_blobs, 0);
}

#[tokio::test]
async fn test_oversized_files_are_skipped() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("small.rs"), "fn s() {}\n").unwrap();
    let huge = "x".repeat(64 * 1024);
    fs::write(tmp.path().join("huge.rs"), &huge).unwrap();

    let mut config = test_config();
    config.chunking.max_file_bytes = 1024;
    let remote = Arc::new(MockRemote::new(Behavior::AcceptAll));
    let result = SyncEngine::new(&config, tmp.path(), remote.clone())
        .synchronize()
        .await
        .unwrap();

    assert_eq!(result.total_blobs, 1);
    let uploaded = remote.uploaded_paths.lock().unwrap().clone();
    assert_eq!(uploaded, vec!["small.rs".to_string()]);
}

#[tokio::test]
async fn test_corrupt_manifest_forces_full_resync() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path());
    let config = test_config();

    SyncEngine::new(&config, tmp.path(), Arc::new(MockRemote::new(Behavior::AcceptAll)))
        .synchronize()
        .await
        .unwrap();

    let store = ManifestStore::new(tmp.path());
    fs::write(store.manifest_path(), "garbage").unwrap();

    let remote = Arc::new(MockRemote::new(Behavior::AcceptAll));
    let result = SyncEngine::new(&config, tmp.path(), remote.clone())
        .synchronize()
        .await
        .unwrap();

    // Empty baseline: everything re-uploads rather than crashing.
    assert_eq!(result.status, IndexStatus::Success);
    assert_eq!(result.new_blobs, 6);
    assert_eq!(ManifestStore::new(tmp.path()).load().len(), 6);
}
