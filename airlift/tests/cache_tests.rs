use airlift::testing::MemorySource;
use airlift::{RecordCache, Store};
use airtable_api::endpoints::records::RecordPatch;
use filetime::FileTime;
use serde_json::{json, Map, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(60 * 60);

fn store_with(source: Arc<MemorySource>, dir: &tempfile::TempDir) -> Store<MemorySource> {
    let cache = RecordCache::new(dir.path().to_path_buf()).unwrap();
    Store::new(source, cache, WINDOW)
}

fn seeded_source() -> Arc<MemorySource> {
    let source = Arc::new(MemorySource::new());
    source.add_table("Links", vec![("r1", json!({"Name": "A", "Done": false}))]);
    source.add_table("Notes", vec![("r2", json!({"Name": "B"}))]);
    source
}

fn age_tables_dir(dir: &tempfile::TempDir, seconds: i64) {
    let old = FileTime::from_unix_time(FileTime::now().unix_seconds() - seconds, 0);
    filetime::set_file_mtime(dir.path().join("tables"), old).unwrap();
}

#[tokio::test]
async fn cold_start_runs_exactly_one_synchronous_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_source();
    let store = store_with(source.clone(), &dir);

    let snapshot = store.read(false).await.unwrap();

    assert_eq!(source.schema_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(snapshot["Links"][0]["id"], json!("r1"));
    assert_eq!(snapshot["Notes"][0]["Name"], json!("B"));
}

#[tokio::test]
async fn empty_base_gets_a_second_rebuild_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let store = store_with(source.clone(), &dir);

    let snapshot = store.read(false).await.unwrap();

    assert!(snapshot.is_empty());
    assert_eq!(source.schema_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fresh_snapshot_is_served_without_touching_the_remote() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_source();
    let store = store_with(source.clone(), &dir);

    store.read(false).await.unwrap();
    let calls_after_cold_start = source.schema_calls.load(Ordering::SeqCst);

    let snapshot = store.read(false).await.unwrap();
    assert_eq!(snapshot["Links"][0]["Name"], json!("A"));
    assert_eq!(source.schema_calls.load(Ordering::SeqCst), calls_after_cold_start);
}

#[tokio::test]
async fn stale_snapshot_triggers_background_rebuild_without_blocking() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_source();
    let store = store_with(source.clone(), &dir);

    store.read(false).await.unwrap();
    age_tables_dir(&dir, 2 * 60 * 60);

    // Park the remote so a blocking read would never return.
    source.hold_remote();
    let snapshot = store.read(false).await.unwrap();
    assert_eq!(snapshot["Links"][0]["Name"], json!("A"));

    let mut completions = store.refresh_completions();
    source.release_remote();
    completions.changed().await.unwrap();
    assert_eq!(source.schema_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn snapshot_just_inside_the_window_does_not_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_source();
    let store = store_with(source.clone(), &dir);

    store.read(false).await.unwrap();
    age_tables_dir(&dir, 30 * 60);

    store.read(false).await.unwrap();
    assert_eq!(source.schema_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn force_read_schedules_a_rebuild_even_when_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_source();
    let store = store_with(source.clone(), &dir);

    store.read(false).await.unwrap();

    let mut completions = store.refresh_completions();
    store.read(true).await.unwrap();
    completions.changed().await.unwrap();
    assert_eq!(source.schema_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn corrupt_snapshot_recovers_with_a_forced_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_source();
    let store = store_with(source.clone(), &dir);

    store.read(false).await.unwrap();
    std::fs::write(dir.path().join("tables").join("Links.json"), "not json").unwrap();

    let snapshot = store.read(false).await.unwrap();
    assert_eq!(snapshot["Links"][0]["Name"], json!("A"));
    assert_eq!(source.schema_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unreadable_snapshot_file_recovers_with_a_forced_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_source();
    let store = store_with(source.clone(), &dir);

    store.read(false).await.unwrap();

    // Replace a snapshot file with a directory: the read fails before any
    // JSON parsing happens.
    let path = dir.path().join("tables").join("Links.json");
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();

    let snapshot = store.read(false).await.unwrap();
    assert_eq!(snapshot["Links"][0]["Name"], json!("A"));
    assert_eq!(source.schema_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cold_start_against_a_held_lock_is_an_error_not_an_empty_base() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_source();
    let store = store_with(source.clone(), &dir);

    // Another rebuilder holds a live lock before anything is on disk.
    let now = chrono::Utc::now().timestamp();
    std::fs::write(dir.path().join("rebuild.lock"), now.to_string()).unwrap();

    match store.read(false).await {
        Err(airlift::CacheError::RebuildInProgress) => {}
        other => panic!("expected RebuildInProgress, got {:?}", other.map(|s| s.len())),
    }
    assert_eq!(source.schema_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn completing_a_record_updates_remote_and_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    source.add_table("Links", vec![("r1", json!({"Name": "A", "Done": false}))]);
    let store = store_with(source.clone(), &dir);

    store.read(false).await.unwrap();

    let mut fields = Map::new();
    fields.insert("Done".to_string(), Value::Bool(true));
    let updated = store
        .update("Links", vec![RecordPatch::new("r1", fields)])
        .await
        .unwrap();

    assert_eq!(updated.len(), 1);
    assert_eq!(source.update_calls.load(Ordering::SeqCst), 1);

    // The post-write rebuild already ran, so a plain read sees the change.
    let snapshot = store.read(false).await.unwrap();
    let record = &snapshot["Links"][0];
    assert_eq!(record["id"], json!("r1"));
    assert_eq!(record["Name"], json!("A"));
    assert_eq!(record["Done"], json!(true));
}

#[tokio::test]
async fn created_records_appear_after_the_synchronous_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_source();
    let store = store_with(source.clone(), &dir);
    store.read(false).await.unwrap();

    let mut fields = Map::new();
    fields.insert("Name".to_string(), json!("C"));
    let created = store
        .create(
            "Links",
            vec![airtable_api::endpoints::records::NewRecord::new(fields)],
        )
        .await
        .unwrap();
    assert_eq!(created.len(), 1);

    let snapshot = store.read(false).await.unwrap();
    assert_eq!(snapshot["Links"].len(), 2);
}

#[tokio::test]
async fn deleted_records_disappear_from_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_source();
    let store = store_with(source.clone(), &dir);
    store.read(false).await.unwrap();

    let deleted = store.delete("Links", vec!["r1".into()]).await.unwrap();
    assert_eq!(deleted.len(), 1);

    let snapshot = store.read(false).await.unwrap();
    assert!(snapshot["Links"].is_empty());
}
