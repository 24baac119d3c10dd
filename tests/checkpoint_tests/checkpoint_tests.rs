//! Tests for checkpoints, vacuum and sync
//!
//! These tests verify:
//! - Checkpoint frame counts for every mode
//! - Checkpoints are refused while a write transaction is open
//! - Automatic checkpoints after a configured number of commits
//! - Delete-journal and in-memory stores have nothing to checkpoint
//! - Vacuum and sync keep every committed key

use std::fs;
use std::path::PathBuf;

use kvlite::{CheckpointMode, Config, JournalMode, KvError, Store};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("test.db")
}

fn wal_path(dir: &TempDir) -> PathBuf {
    dir.path().join("test.db-wal")
}

/// Fresh WAL store; opening it commits one bootstrap frame
fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(db_path(&temp_dir), Config::default()).unwrap();
    (temp_dir, store)
}

fn put_keys(store: &Store, count: usize) {
    for i in 0..count {
        store.put(format!("key{:03}", i).as_bytes(), b"value").unwrap();
    }
}

// =============================================================================
// Checkpoint Modes
// =============================================================================

#[test]
fn test_passive_checkpoint_counts_frames() {
    let (_temp, store) = setup_temp_store();
    put_keys(&store, 2);

    assert_eq!(store.checkpoint(CheckpointMode::Passive).unwrap(), (3, 3));
    // Nothing new to copy, the log keeps its frames
    assert_eq!(store.checkpoint(CheckpointMode::Full).unwrap(), (3, 3));
}

#[test]
fn test_restart_checkpoint_empties_log() {
    let (temp, store) = setup_temp_store();
    put_keys(&store, 4);

    assert_eq!(store.checkpoint(CheckpointMode::Restart).unwrap(), (5, 5));
    assert_eq!(fs::metadata(wal_path(&temp)).unwrap().len(), 0);
    assert_eq!(store.checkpoint(CheckpointMode::Passive).unwrap(), (0, 0));
}

#[test]
fn test_truncate_checkpoint_reports_zero() {
    let (temp, store) = setup_temp_store();
    put_keys(&store, 3);

    assert_eq!(store.checkpoint(CheckpointMode::Truncate).unwrap(), (0, 0));
    assert_eq!(fs::metadata(wal_path(&temp)).unwrap().len(), 0);
}

#[test]
fn test_log_restarts_after_full_checkpoint() {
    let (_temp, store) = setup_temp_store();
    put_keys(&store, 2);
    store.checkpoint(CheckpointMode::Full).unwrap();

    store.put(b"after", b"checkpoint").unwrap();
    assert_eq!(store.checkpoint(CheckpointMode::Passive).unwrap(), (1, 1));
}

#[test]
fn test_checkpoint_busy_inside_write_transaction() {
    let (_temp, store) = setup_temp_store();

    store.begin(true).unwrap();
    store.put(b"k", b"v").unwrap();
    assert!(matches!(
        store.checkpoint(CheckpointMode::Passive),
        Err(KvError::Busy(_))
    ));
    store.commit().unwrap();

    assert_eq!(store.checkpoint(CheckpointMode::Passive).unwrap(), (2, 2));
}

#[test]
fn test_checkpoint_inside_explicit_read() {
    let (_temp, store) = setup_temp_store();
    store.put(b"k", b"v").unwrap();

    store.begin(false).unwrap();
    assert_eq!(store.checkpoint(CheckpointMode::Passive).unwrap(), (2, 2));
    assert_eq!(store.get(b"k").unwrap(), b"v");
    store.commit().unwrap();
}

#[test]
fn test_full_checkpoint_busy_while_other_store_writes() {
    let temp = TempDir::new().unwrap();
    let writer = Store::open(db_path(&temp), Config::default()).unwrap();
    let other = Store::open(db_path(&temp), Config::default()).unwrap();

    writer.begin(true).unwrap();
    writer.put(b"k", b"v").unwrap();

    assert!(matches!(
        other.checkpoint(CheckpointMode::Full),
        Err(KvError::Busy(_))
    ));
    // Passive never waits for the writer
    assert_eq!(other.checkpoint(CheckpointMode::Passive).unwrap(), (1, 1));

    // The log was fully backfilled, so the commit starts it over
    writer.commit().unwrap();
    assert_eq!(other.checkpoint(CheckpointMode::Full).unwrap(), (1, 1));
}

// =============================================================================
// Automatic Checkpoints
// =============================================================================

#[test]
fn test_auto_checkpoint_after_commit_limit() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder().wal_size_limit(2).build();
    let store = Store::open(db_path(&temp), config).unwrap();

    // The second commit triggers a checkpoint; the third restarts the log
    put_keys(&store, 3);
    assert_eq!(store.checkpoint(CheckpointMode::Passive).unwrap(), (1, 1));
}

#[test]
fn test_no_auto_checkpoint_by_default() {
    let (_temp, store) = setup_temp_store();
    put_keys(&store, 3);
    assert_eq!(store.checkpoint(CheckpointMode::Passive).unwrap(), (4, 4));
}

// =============================================================================
// Journal Modes
// =============================================================================

#[test]
fn test_delete_mode_has_nothing_to_checkpoint() {
    let temp = TempDir::new().unwrap();
    let store = Store::open_default(db_path(&temp), JournalMode::Delete).unwrap();
    put_keys(&store, 3);

    for mode in [
        CheckpointMode::Passive,
        CheckpointMode::Full,
        CheckpointMode::Restart,
        CheckpointMode::Truncate,
    ] {
        assert_eq!(store.checkpoint(mode).unwrap(), (0, 0));
    }
    assert!(!wal_path(&temp).exists());
}

#[test]
fn test_in_memory_checkpoint_is_noop() {
    let store = Store::open_in_memory(Config::default()).unwrap();
    put_keys(&store, 3);
    assert_eq!(store.checkpoint(CheckpointMode::Truncate).unwrap(), (0, 0));
}

#[test]
fn test_read_only_checkpoint_is_noop() {
    let temp = TempDir::new().unwrap();
    {
        let store = Store::open(db_path(&temp), Config::default()).unwrap();
        put_keys(&store, 2);
    }

    let config = Config::builder().read_only(true).build();
    let store = Store::open(db_path(&temp), config).unwrap();
    assert_eq!(store.checkpoint(CheckpointMode::Full).unwrap(), (0, 0));
    assert_eq!(store.get(b"key001").unwrap(), b"value");
}

// =============================================================================
// Vacuum and Sync
// =============================================================================

#[test]
fn test_vacuum_busy_inside_write_transaction() {
    let (_temp, store) = setup_temp_store();

    store.begin(true).unwrap();
    assert!(matches!(store.incremental_vacuum(0), Err(KvError::Busy(_))));
    store.rollback().unwrap();

    store.incremental_vacuum(0).unwrap();
}

#[test]
fn test_vacuum_keeps_data() {
    let temp = TempDir::new().unwrap();
    {
        let store = Store::open(db_path(&temp), Config::default()).unwrap();
        put_keys(&store, 20);
        for i in (0..20).step_by(2) {
            store.delete(format!("key{:03}", i).as_bytes()).unwrap();
        }
        store.incremental_vacuum(5).unwrap();
        assert_eq!(store.checkpoint(CheckpointMode::Passive).unwrap(), (0, 0));
    }

    let store = Store::open(db_path(&temp), Config::default()).unwrap();
    assert!(store.get(b"key000").unwrap_err().is_not_found());
    assert_eq!(store.get(b"key019").unwrap(), b"value");
    store.integrity_check().unwrap();
}

#[test]
fn test_sync_in_both_journal_modes() {
    let temp = TempDir::new().unwrap();
    let wal = Store::open(temp.path().join("wal.db"), Config::default()).unwrap();
    wal.put(b"k", b"v").unwrap();
    wal.sync().unwrap();

    let delete = Store::open_default(temp.path().join("delete.db"), JournalMode::Delete).unwrap();
    delete.put(b"k", b"v").unwrap();
    delete.sync().unwrap();

    let memory = Store::open_in_memory(Config::default()).unwrap();
    memory.sync().unwrap();
}
