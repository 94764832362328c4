//! Integration test: LocalEnumerator + SyncEngine → MemoryRemoteStore
//!
//! Drives whole upsync runs against a real temporary directory and the
//! in-memory store, checking the tally after each run and the final bucket
//! contents.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use bucketsync_core::domain::{
    format_mtime, BucketName, ObjectKey, ObjectMetadata, RetentionPolicy, SyncPath, SyncTally,
    MTIME_METADATA_KEY,
};
use bucketsync_core::ports::{FixedConfirmation, IRemoteStore};
use bucketsync_store::MemoryRemoteStore;
use bucketsync_sync::engine::{SyncEngine, SyncOutcome, UpsyncOptions};
use bucketsync_sync::filesystem::LocalEnumerator;

fn bucket() -> BucketName {
    BucketName::new("nightly-backups".to_string()).unwrap()
}

fn key(s: &str) -> ObjectKey {
    ObjectKey::new(s.to_string()).unwrap()
}

/// Noon today (UTC), so day boundaries are never a few seconds away
fn noon() -> DateTime<Utc> {
    Utc::now()
        .date_naive()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_utc()
}

fn write_at(dir: &Path, rel: &str, body: &[u8], modified: DateTime<Utc>) {
    let path = dir.join(rel);
    std::fs::write(&path, body).unwrap();
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(modified.into())
        .unwrap();
}

fn mtime_meta(modified: DateTime<Utc>) -> ObjectMetadata {
    [(MTIME_METADATA_KEY.to_string(), format_mtime(modified))]
        .into_iter()
        .collect()
}

fn counts(tally: &SyncTally) -> (u64, u64, u64, u64, u64) {
    (
        tally.created,
        tally.updated,
        tally.skipped,
        tally.deleted,
        tally.retained,
    )
}

async fn run(
    store: &Arc<MemoryRemoteStore>,
    dir: &TempDir,
    options: UpsyncOptions,
    now: DateTime<Utc>,
) -> SyncTally {
    let engine = SyncEngine::new(
        Arc::clone(store) as Arc<dyn IRemoteStore>,
        Arc::new(LocalEnumerator::new()),
        Arc::new(FixedConfirmation(true)),
    );
    let root = SyncPath::new(dir.path().to_path_buf()).unwrap();
    match engine.upsync(&bucket(), &root, options, &now).await.unwrap() {
        SyncOutcome::Completed(tally) => tally,
        other => panic!("expected a completed run, got {other:?}"),
    }
}

fn retention(days: u32, weeks: u32, months: u32, glob: &str) -> UpsyncOptions {
    UpsyncOptions {
        glob: glob.to_string(),
        no_prompt: true,
        backups_retain: true,
        retention: RetentionPolicy::new(days, weeks, months),
        ..UpsyncOptions::default()
    }
}

#[tokio::test]
async fn test_repeated_runs_converge() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRemoteStore::with_bucket(&bucket()));
    let now = noon();
    write_at(dir.path(), "a.txt", b"alpha", now - Duration::hours(2));
    write_at(dir.path(), "b.txt", b"beta", now - Duration::hours(2));

    let first = run(&store, &dir, UpsyncOptions::default(), now).await;
    assert_eq!(counts(&first), (2, 0, 0, 0, 0));

    write_at(dir.path(), "a.txt", b"alpha, edited", now - Duration::hours(1));
    let second = run(&store, &dir, UpsyncOptions::default(), now).await;
    assert_eq!(counts(&second), (0, 1, 1, 0, 0));

    let third = run(&store, &dir, UpsyncOptions::default(), now).await;
    assert_eq!(counts(&third), (0, 0, 2, 0, 0));

    assert_eq!(store.put_count(), 3);
    assert_eq!(
        store.object(&bucket(), &key("a.txt")).unwrap().body,
        b"alpha, edited"
    );
    assert_eq!(
        first.report_line(),
        "2 created. 0 updated. 0 local skipped. 0 deleted remotely. 0 retained remotely."
    );
}

#[tokio::test]
async fn test_new_year_fixture_report_lines() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRemoteStore::with_bucket(&bucket()));
    let at = |day| Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
    let now = at(3) + Duration::hours(12);
    write_at(dir.path(), "a.txt", b"first draft", at(1));
    write_at(dir.path(), "b.txt", b"second file", at(2));

    let first = run(&store, &dir, UpsyncOptions::default(), now).await;
    assert_eq!(
        first.report_line(),
        "2 created. 0 updated. 0 local skipped. 0 deleted remotely. 0 retained remotely."
    );

    write_at(dir.path(), "a.txt", b"second draft", at(3));
    let second = run(&store, &dir, UpsyncOptions::default(), now).await;
    assert_eq!(
        second.report_line(),
        "0 created. 1 updated. 1 local skipped. 0 deleted remotely. 0 retained remotely."
    );

    let third = run(&store, &dir, UpsyncOptions::default(), now).await;
    assert_eq!(
        third.report_line(),
        "0 created. 0 updated. 2 local skipped. 0 deleted remotely. 0 retained remotely."
    );
    assert_eq!(
        store.object(&bucket(), &key("a.txt")).unwrap().metadata[MTIME_METADATA_KEY],
        format_mtime(at(3))
    );
}

#[tokio::test]
async fn test_touched_file_with_same_content_updates_metadata_only() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRemoteStore::with_bucket(&bucket()));
    let now = noon();
    write_at(dir.path(), "a.txt", b"same", now - Duration::hours(3));
    run(&store, &dir, UpsyncOptions::default(), now).await;

    write_at(dir.path(), "a.txt", b"same", now - Duration::hours(1));
    let tally = run(&store, &dir, UpsyncOptions::default(), now).await;

    assert_eq!(counts(&tally), (0, 1, 0, 0, 0));
    assert_eq!(store.put_count(), 1);
    assert_eq!(store.metadata_update_count(), 1);
}

#[tokio::test]
async fn test_retention_keeps_most_recent_days() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRemoteStore::with_bucket(&bucket()));
    let now = noon();
    write_at(dir.path(), "old.tar", b"o", now - Duration::days(3));
    write_at(dir.path(), "mid.tar", b"m", now - Duration::days(1));
    write_at(dir.path(), "new.tar", b"n", now);

    let tally = run(&store, &dir, retention(2, 0, 0, "**/*"), now).await;

    assert_eq!(counts(&tally), (2, 0, 1, 0, 2));
    assert_eq!(store.keys(&bucket()), vec![key("mid.tar"), key("new.tar")]);
}

#[tokio::test]
async fn test_retention_prunes_stale_remote_snapshots() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRemoteStore::with_bucket(&bucket()));
    let now = noon();
    for days in [4, 5, 6] {
        store.insert_object(
            &bucket(),
            &key(&format!("db-{days}.sql.gz")),
            b"dump".to_vec(),
            mtime_meta(now - Duration::days(days)),
            now - Duration::days(days),
        );
    }
    write_at(dir.path(), "db-0.sql.gz", b"today", now);

    let tally = run(&store, &dir, retention(2, 0, 0, "*.sql.gz"), now).await;

    assert_eq!(counts(&tally), (1, 0, 0, 3, 1));
    assert_eq!(store.keys(&bucket()), vec![key("db-0.sql.gz")]);
}

#[tokio::test]
async fn test_deletion_respects_glob() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRemoteStore::with_bucket(&bucket()));
    let now = noon();
    let ancient = now - Duration::days(400);
    store.insert_object(&bucket(), &key("notes.txt"), b"keep me".to_vec(), mtime_meta(ancient), ancient);
    store.insert_object(&bucket(), &key("db-old.sql.gz"), b"old".to_vec(), mtime_meta(ancient), ancient);
    write_at(dir.path(), "db-new.sql.gz", b"new", now);

    let tally = run(&store, &dir, retention(1, 0, 0, "*.sql.gz"), now).await;

    assert_eq!(tally.deleted, 1);
    assert_eq!(
        store.keys(&bucket()),
        vec![key("db-new.sql.gz"), key("notes.txt")]
    );
}

#[tokio::test]
async fn test_remote_last_modified_used_without_mtime_metadata() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRemoteStore::with_bucket(&bucket()));
    let now = noon();
    store.insert_object(
        &bucket(),
        &key("legacy.tar"),
        b"legacy".to_vec(),
        ObjectMetadata::new(),
        now - Duration::days(30),
    );
    write_at(dir.path(), "fresh.tar", b"fresh", now);

    let tally = run(&store, &dir, retention(3, 0, 0, "*.tar"), now).await;

    assert_eq!(tally.deleted, 1);
    assert_eq!(store.keys(&bucket()), vec![key("fresh.tar")]);
}

/// Local files plus a remote bucket with one stale, one outdated object
fn seed(dir: &TempDir, store: &MemoryRemoteStore, now: DateTime<Utc>) {
    write_at(dir.path(), "a.sql.gz", b"a", now);
    write_at(dir.path(), "b.sql.gz", b"b, new", now - Duration::days(1));
    write_at(dir.path(), "c.sql.gz", b"c", now - Duration::days(3));
    store.insert_object(
        &bucket(),
        &key("b.sql.gz"),
        b"b, old".to_vec(),
        mtime_meta(now - Duration::days(2)),
        now - Duration::days(2),
    );
    store.insert_object(
        &bucket(),
        &key("old.sql.gz"),
        b"old".to_vec(),
        mtime_meta(now - Duration::days(5)),
        now - Duration::days(5),
    );
}

#[tokio::test]
async fn test_dry_run_matches_real_run() {
    let now = noon();

    let dry_dir = TempDir::new().unwrap();
    let dry_store = Arc::new(MemoryRemoteStore::with_bucket(&bucket()));
    seed(&dry_dir, &dry_store, now);
    let before = dry_store.keys(&bucket());
    let dry = run(
        &dry_store,
        &dry_dir,
        UpsyncOptions {
            dry_run: true,
            ..retention(2, 0, 0, "*.sql.gz")
        },
        now,
    )
    .await;

    let live_dir = TempDir::new().unwrap();
    let live_store = Arc::new(MemoryRemoteStore::with_bucket(&bucket()));
    seed(&live_dir, &live_store, now);
    let live = run(&live_store, &live_dir, retention(2, 0, 0, "*.sql.gz"), now).await;

    assert_eq!(counts(&live), (1, 1, 1, 1, 2));
    assert_eq!(counts(&dry), counts(&live));
    assert_eq!(dry_store.mutation_count(), 0);
    assert_eq!(dry_store.keys(&bucket()), before);
    assert_eq!(
        live_store.keys(&bucket()),
        vec![key("a.sql.gz"), key("b.sql.gz")]
    );
}

#[tokio::test]
async fn test_failed_head_is_never_deleted() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRemoteStore::with_bucket(&bucket()));
    let now = noon();
    let ancient = now - Duration::days(90);
    store.insert_object(&bucket(), &key("flaky.tar"), b"x".to_vec(), mtime_meta(ancient), ancient);
    store.fail_key(&key("flaky.tar"));
    write_at(dir.path(), "today.tar", b"t", now);

    let tally = run(&store, &dir, retention(1, 0, 0, "*.tar"), now).await;

    assert_eq!(tally.deleted, 0);
    assert_eq!(tally.failures.len(), 1);
    assert_eq!(tally.failures[0].key, "flaky.tar");
    assert!(store.object(&bucket(), &key("flaky.tar")).is_some());
}

#[tokio::test]
async fn test_same_second_snapshots_settle() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRemoteStore::with_bucket(&bucket()));
    let second = noon() - Duration::hours(2);
    let early = second + Duration::milliseconds(200);
    let late = second + Duration::milliseconds(800);
    store.insert_object(&bucket(), &key("a.sql"), b"a".to_vec(), mtime_meta(late), late);
    write_at(dir.path(), "a.sql", b"a", late);
    write_at(dir.path(), "z.sql", b"z", early);

    let first = run(&store, &dir, retention(1, 0, 0, "*.sql"), noon()).await;
    let again = run(&store, &dir, retention(1, 0, 0, "*.sql"), noon()).await;

    assert_eq!(counts(&first), (0, 0, 1, 0, 1));
    assert_eq!(counts(&again), (0, 0, 1, 0, 1));
    assert_eq!(store.mutation_count(), 0);
    assert_eq!(store.keys(&bucket()), vec![key("a.sql")]);
}
