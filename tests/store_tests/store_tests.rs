//! Tests for the Store
//!
//! These tests verify:
//! - Basic CRUD on the default column family
//! - Upserts, empty values and size limits
//! - Persistence across reopen in both journal modes
//! - Stats counters and the last error message
//! - Integrity checks and the corruption flag
//! - Read-only stores, closed stores and shared engines
//! - Handles shared between threads

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use kvlite::{
    CheckpointMode, Config, ErrorCode, JournalMode, KvError, Store, MAX_KEY_LEN, MAX_VALUE_LEN,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(temp_dir.path().join("test.db"), Config::default()).unwrap();
    (temp_dir, store)
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("test.db")
}

fn memory_store() -> Store {
    Store::open_in_memory(Config::default()).unwrap()
}

fn count_entries(store: &Store) -> usize {
    let mut iter = store.iter().unwrap();
    iter.first().unwrap();
    let mut count = 0;
    while !iter.eof() {
        count += 1;
        iter.next().unwrap();
    }
    count
}

fn flip_last_byte(path: &Path) {
    let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    let len = file.metadata().unwrap().len();
    file.seek(SeekFrom::Start(len - 1)).unwrap();
    let mut byte = [0u8; 1];
    std::io::Read::read_exact(&mut file, &mut byte).unwrap();
    file.seek(SeekFrom::Start(len - 1)).unwrap();
    file.write_all(&[byte[0] ^ 0xFF]).unwrap();
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_basic_crud() {
    let (_temp, store) = setup_temp_store();

    store.put(b"apple", b"red").unwrap();
    store.put(b"banana", b"yellow").unwrap();

    assert!(store.exists(b"apple").unwrap());
    store.delete(b"apple").unwrap();
    assert!(!store.exists(b"apple").unwrap());
    assert_eq!(store.get(b"banana").unwrap(), b"yellow");
}

#[test]
fn test_get_missing_key() {
    let store = memory_store();

    let err = store.get(b"missing").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[test]
fn test_delete_missing_key() {
    let store = memory_store();
    assert!(matches!(store.delete(b"missing"), Err(KvError::NotFound)));

    store.put(b"k", b"v").unwrap();
    store.delete(b"k").unwrap();
    assert!(matches!(store.delete(b"k"), Err(KvError::NotFound)));
}

#[test]
fn test_upsert_keeps_one_entry() {
    let store = memory_store();

    store.put(b"k", b"v1").unwrap();
    store.put(b"k", b"v2").unwrap();
    store.put(b"k", b"v3").unwrap();

    assert_eq!(store.get(b"k").unwrap(), b"v3");
    assert_eq!(count_entries(&store), 1);
}

#[test]
fn test_empty_value() {
    let store = memory_store();

    store.put(b"flag", b"").unwrap();
    assert!(store.exists(b"flag").unwrap());
    assert!(store.get(b"flag").unwrap().is_empty());
}

#[test]
fn test_binary_keys_and_values() {
    let store = memory_store();
    let key = [0u8, 255, 0, 1];
    let value: Vec<u8> = (0..=255).collect();

    store.put(&key, &value).unwrap();
    assert_eq!(store.get(&key).unwrap(), value);
}

// =============================================================================
// Limits
// =============================================================================

#[test]
fn test_key_limits() {
    let store = memory_store();

    let err = store.put(b"", b"v").unwrap_err();
    assert!(matches!(err, KvError::InvalidArgument(_)));
    assert_eq!(err.code(), ErrorCode::Error);

    let largest = vec![b'k'; MAX_KEY_LEN];
    store.put(&largest, b"v").unwrap();
    assert_eq!(store.get(&largest).unwrap(), b"v");

    let too_long = vec![b'k'; MAX_KEY_LEN + 1];
    assert!(matches!(store.put(&too_long, b"v"), Err(KvError::InvalidArgument(_))));
    assert!(matches!(store.get(&too_long), Err(KvError::InvalidArgument(_))));
}

#[test]
fn test_value_limit() {
    let store = memory_store();

    let too_big = vec![0u8; MAX_VALUE_LEN + 1];
    assert!(matches!(store.put(b"k", &too_big), Err(KvError::InvalidArgument(_))));
    assert!(!store.exists(b"k").unwrap());
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_reopen_wal_mode() {
    let temp = TempDir::new().unwrap();
    {
        let store = Store::open(db_path(&temp), Config::default()).unwrap();
        for i in 0..50 {
            store.put(format!("key{:03}", i).as_bytes(), format!("value{}", i).as_bytes()).unwrap();
        }
        store.delete(b"key007").unwrap();
        store.close();
    }

    let store = Store::open(db_path(&temp), Config::default()).unwrap();
    assert_eq!(count_entries(&store), 49);
    assert_eq!(store.get(b"key042").unwrap(), b"value42");
    assert!(store.get(b"key007").unwrap_err().is_not_found());
}

#[test]
fn test_reopen_delete_mode() {
    let temp = TempDir::new().unwrap();
    {
        let store = Store::open_default(db_path(&temp), JournalMode::Delete).unwrap();
        store.put(b"k", b"v").unwrap();
    }

    let store = Store::open_default(db_path(&temp), JournalMode::Delete).unwrap();
    assert_eq!(store.get(b"k").unwrap(), b"v");
}

#[test]
fn test_reopen_after_checkpoint_and_vacuum() {
    let temp = TempDir::new().unwrap();
    {
        let store = Store::open(db_path(&temp), Config::default()).unwrap();
        store.put(b"a", b"1").unwrap();
        store.checkpoint(CheckpointMode::Truncate).unwrap();
        store.put(b"b", b"2").unwrap();
        store.incremental_vacuum(0).unwrap();
        store.put(b"c", b"3").unwrap();
        store.sync().unwrap();
    }

    let store = Store::open(db_path(&temp), Config::default()).unwrap();
    assert_eq!(count_entries(&store), 3);
}

#[test]
fn test_in_memory_store_has_no_path() {
    let store = memory_store();
    assert!(store.path().is_none());
    store.put(b"k", b"v").unwrap();
    assert_eq!(store.checkpoint(CheckpointMode::Passive).unwrap(), (0, 0));
}

// =============================================================================
// Stats and Error Messages
// =============================================================================

#[test]
fn test_stats_counters() {
    let store = memory_store();

    store.put(b"a", b"1").unwrap();
    store.put(b"b", b"2").unwrap();
    store.get(b"a").unwrap();
    let _ = store.get(b"missing");
    store.delete(b"a").unwrap();
    let _ = store.delete(b"a");
    let _ = store.put(b"", b"x");
    drop(store.iter().unwrap());

    let stats = store.stats();
    assert_eq!(stats.puts, 2);
    assert_eq!(stats.gets, 2);
    assert_eq!(stats.deletes, 1);
    assert_eq!(stats.iterations, 1);
    assert_eq!(stats.errors, 1);
}

#[test]
fn test_errmsg() {
    let store = memory_store();
    assert_eq!(store.errmsg(), "no error");

    let _ = store.get(b"missing");
    assert_eq!(store.errmsg(), "no error");

    let _ = store.put(b"", b"v");
    assert!(store.errmsg().contains("key is empty"));
}

// =============================================================================
// Integrity
// =============================================================================

#[test]
fn test_integrity_check_healthy_store() {
    let (_temp, store) = setup_temp_store();
    let users = store.cf_create("users").unwrap();
    users.put(b"u1", b"alice").unwrap();
    users.put_with_ttl(b"session", b"s", kvlite::now_ms() + 60_000).unwrap();
    store.put(b"k", b"v").unwrap();

    store.integrity_check().unwrap();
    assert!(!store.is_corrupted());
}

#[test]
fn test_corrupt_main_file_refused() {
    let temp = TempDir::new().unwrap();
    {
        let store = Store::open_default(db_path(&temp), JournalMode::Delete).unwrap();
        store.put(b"k", b"v").unwrap();
    }
    flip_last_byte(&db_path(&temp));

    let err = Store::open_default(db_path(&temp), JournalMode::Delete).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Corrupt);
}

// =============================================================================
// Access Modes
// =============================================================================

#[test]
fn test_read_only_store() {
    let temp = TempDir::new().unwrap();
    {
        let store = Store::open(db_path(&temp), Config::default()).unwrap();
        store.put(b"k", b"v").unwrap();
    }

    let config = Config::builder().read_only(true).build();
    let store = Store::open(db_path(&temp), config).unwrap();
    assert_eq!(store.get(b"k").unwrap(), b"v");

    let err = store.put(b"k2", b"v").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ReadOnly);
    assert!(store.cf_create("users").is_err());
}

#[test]
fn test_read_only_missing_database() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder().read_only(true).build();

    let err = Store::open(db_path(&temp), config).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ReadOnly);
    assert!(!db_path(&temp).exists());
}

#[test]
fn test_invalid_page_size_rejected() {
    let config = Config::builder().page_size(1000).build();
    assert!(matches!(Store::open_in_memory(config), Err(KvError::InvalidArgument(_))));
}

#[test]
fn test_handle_outliving_store() {
    let store = memory_store();
    let cf = store.cf_default().unwrap();
    cf.put(b"k", b"v").unwrap();
    store.close();

    let err = cf.get(b"k").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Protocol);
}

#[test]
fn test_stores_share_engine_in_process() {
    let temp = TempDir::new().unwrap();
    let first = Store::open(db_path(&temp), Config::default()).unwrap();
    let second = Store::open(db_path(&temp), Config::default()).unwrap();

    first.put(b"shared", b"1").unwrap();
    assert_eq!(second.get(b"shared").unwrap(), b"1");

    second.put(b"shared", b"2").unwrap();
    assert_eq!(first.get(b"shared").unwrap(), b"2");
}

#[test]
fn test_writer_contention_reports_busy() {
    let temp = TempDir::new().unwrap();
    let first = Store::open(db_path(&temp), Config::default()).unwrap();
    let second = Store::open(db_path(&temp), Config::default()).unwrap();

    first.begin(true).unwrap();
    first.put(b"a", b"1").unwrap();

    let err = second.put(b"b", b"2").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Busy);

    first.commit().unwrap();
    second.put(b"b", b"2").unwrap();
    assert_eq!(second.get(b"a").unwrap(), b"1");
}

#[test]
fn test_database_files_created() {
    let temp = TempDir::new().unwrap();
    let store = Store::open(db_path(&temp), Config::default()).unwrap();
    store.put(b"k", b"v").unwrap();

    let names: Vec<String> = fs::read_dir(temp.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.contains(&"test.db-wal".to_string()));
    assert!(names.contains(&"test.db-lock".to_string()));
}

// =============================================================================
// Threads
// =============================================================================

#[test]
fn test_column_family_shared_between_threads() {
    const THREADS: usize = 4;
    const KEYS_PER_THREAD: usize = 100;

    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);
    let shared = store.cf_create("shared").unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let cf = shared.clone();
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..KEYS_PER_THREAD {
                    let key = format!("t{}-{:03}", t, i);
                    cf.put(key.as_bytes(), format!("v{}", i).as_bytes()).unwrap();
                }
                for i in 0..KEYS_PER_THREAD {
                    let key = format!("t{}-{:03}", t, i);
                    assert_eq!(cf.get(key.as_bytes()).unwrap(), format!("v{}", i).into_bytes());
                }
                store.put(format!("done{}", t).as_bytes(), b"1").unwrap();

                let mut iter = cf.prefix_iter(format!("t{}-", t).as_bytes()).unwrap();
                let mut seen = 0;
                while !iter.eof() {
                    seen += 1;
                    iter.next().unwrap();
                }
                seen
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap(), KEYS_PER_THREAD);
    }

    let mut iter = shared.iter().unwrap();
    iter.first().unwrap();
    let mut total = 0;
    while !iter.eof() {
        total += 1;
        iter.next().unwrap();
    }
    drop(iter);

    assert_eq!(total, THREADS * KEYS_PER_THREAD);
    assert_eq!(count_entries(&store), THREADS);

    let stats = store.stats();
    assert_eq!(stats.puts, (THREADS * KEYS_PER_THREAD + THREADS) as u64);
    assert_eq!(stats.gets, (THREADS * KEYS_PER_THREAD) as u64);
    assert_eq!(stats.iterations, (THREADS + 2) as u64);
    assert_eq!(stats.errors, 0);
    store.integrity_check().unwrap();
}
