//! Tests for explicit transactions
//!
//! These tests verify:
//! - Writes inside begin/commit become visible together
//! - Rollback discards every write of the transaction
//! - Transaction state transitions and their error codes
//! - Reads inside a write transaction see its own writes
//! - Explicit read transactions keep a stable view

use kvlite::{Config, ErrorCode, KvError, Store, TxnState};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(temp_dir.path().join("test.db"), Config::default()).unwrap();
    (temp_dir, store)
}

fn memory_store() -> Store {
    Store::open_in_memory(Config::default()).unwrap()
}

fn put_batch(store: &Store, count: usize) {
    for i in 0..count {
        store.put(format!("batch{}", i).as_bytes(), b"v").unwrap();
    }
}

// =============================================================================
// Atomicity
// =============================================================================

#[test]
fn test_commit_makes_batch_visible() {
    let store = memory_store();

    store.begin(true).unwrap();
    put_batch(&store, 10);
    store.commit().unwrap();

    for i in 0..10 {
        assert!(store.exists(format!("batch{}", i).as_bytes()).unwrap());
    }
}

#[test]
fn test_rollback_discards_batch() {
    let store = memory_store();

    store.begin(true).unwrap();
    put_batch(&store, 10);
    store.rollback().unwrap();

    for i in 0..10 {
        assert!(!store.exists(format!("batch{}", i).as_bytes()).unwrap());
    }
}

#[test]
fn test_rollback_restores_overwritten_and_deleted() {
    let store = memory_store();
    store.put(b"keep", b"original").unwrap();
    store.put(b"gone", b"here").unwrap();

    store.begin(true).unwrap();
    store.put(b"keep", b"changed").unwrap();
    store.delete(b"gone").unwrap();
    store.rollback().unwrap();

    assert_eq!(store.get(b"keep").unwrap(), b"original");
    assert_eq!(store.get(b"gone").unwrap(), b"here");
}

#[test]
fn test_write_txn_sees_own_writes() {
    let store = memory_store();

    store.begin(true).unwrap();
    store.put(b"k", b"v").unwrap();
    assert_eq!(store.get(b"k").unwrap(), b"v");

    let mut iter = store.iter().unwrap();
    iter.first().unwrap();
    assert_eq!(iter.key().unwrap(), b"k");
    drop(iter);

    store.commit().unwrap();
}

#[test]
fn test_failed_op_keeps_explicit_txn_open() {
    let store = memory_store();

    store.begin(true).unwrap();
    store.put(b"a", b"1").unwrap();
    assert!(store.put(b"", b"bad").is_err());
    assert_eq!(store.txn_state(), TxnState::Write);
    store.commit().unwrap();

    assert_eq!(store.get(b"a").unwrap(), b"1");
}

#[test]
fn test_committed_batch_survives_reopen() {
    let (temp, store) = setup_temp_store();
    store.begin(true).unwrap();
    put_batch(&store, 5);
    store.commit().unwrap();

    store.begin(true).unwrap();
    store.put(b"uncommitted", b"x").unwrap();
    store.close();

    let store = Store::open(temp.path().join("test.db"), Config::default()).unwrap();
    assert!(store.exists(b"batch4").unwrap());
    assert!(!store.exists(b"uncommitted").unwrap());
}

// =============================================================================
// State Transitions
// =============================================================================

#[test]
fn test_persistent_read_between_operations() {
    let store = memory_store();
    assert_eq!(store.txn_state(), TxnState::Read);

    store.put(b"k", b"v").unwrap();
    assert_eq!(store.txn_state(), TxnState::Read);

    store.begin(true).unwrap();
    assert_eq!(store.txn_state(), TxnState::Write);
    store.commit().unwrap();
    assert_eq!(store.txn_state(), TxnState::Read);
}

#[test]
fn test_begin_twice_fails() {
    let store = memory_store();

    store.begin(true).unwrap();
    assert!(matches!(store.begin(true), Err(KvError::TransactionActive)));
    assert!(matches!(store.begin(false), Err(KvError::TransactionActive)));
    store.rollback().unwrap();
}

#[test]
fn test_begin_read_then_write() {
    let store = memory_store();

    store.begin(false).unwrap();
    assert_eq!(store.txn_state(), TxnState::Read);
    store.begin(true).unwrap();
    assert_eq!(store.txn_state(), TxnState::Write);
    store.put(b"k", b"v").unwrap();
    store.commit().unwrap();

    assert_eq!(store.get(b"k").unwrap(), b"v");
}

#[test]
fn test_rollback_without_txn_is_noop() {
    let store = memory_store();
    store.rollback().unwrap();
    store.rollback().unwrap();
    assert_eq!(store.txn_state(), TxnState::Read);
}

#[test]
fn test_cf_create_rolls_back() {
    let store = memory_store();

    store.begin(true).unwrap();
    let temp = store.cf_create("temp").unwrap();
    store.rollback().unwrap();

    assert_eq!(store.cf_list().unwrap(), vec!["default"]);
    assert!(store.cf_open("temp").unwrap_err().is_not_found());
    assert_eq!(temp.put(b"k", b"v").unwrap_err().code(), ErrorCode::Protocol);
}

#[test]
fn test_rolled_back_cf_handle_cannot_reach_new_cf() {
    let store = memory_store();

    store.begin(true).unwrap();
    let ghost = store.cf_create("ghost").unwrap();
    store.rollback().unwrap();

    let real = store.cf_create("real").unwrap();
    real.put(b"secret", b"1").unwrap();

    assert_eq!(ghost.get(b"secret").unwrap_err().code(), ErrorCode::Protocol);
    assert_eq!(ghost.put(b"secret", b"2").unwrap_err().code(), ErrorCode::Protocol);
    assert_eq!(real.get(b"secret").unwrap(), b"1");

    // The name is free again and gets a working handle
    let ghost = store.cf_create("ghost").unwrap();
    ghost.put(b"k", b"v").unwrap();
    assert_eq!(store.cf_open("ghost").unwrap().get(b"k").unwrap(), b"v");
}

#[test]
fn test_cf_created_in_committed_txn_stays_usable() {
    let store = memory_store();

    store.begin(true).unwrap();
    let users = store.cf_create("users").unwrap();
    users.put(b"u1", b"alice").unwrap();
    store.commit().unwrap();

    // A later rollback leaves committed column families alone
    store.begin(true).unwrap();
    users.put(b"u2", b"bob").unwrap();
    store.rollback().unwrap();

    assert_eq!(users.get(b"u1").unwrap(), b"alice");
    assert!(users.get(b"u2").unwrap_err().is_not_found());
    assert_eq!(store.cf_open("users").unwrap().get(b"u1").unwrap(), b"alice");
}

#[test]
fn test_write_inside_explicit_read_is_refused() {
    let store = memory_store();
    store.put(b"k", b"old").unwrap();

    store.begin(false).unwrap();
    assert_eq!(store.put(b"k", b"new").unwrap_err().code(), ErrorCode::ReadOnly);
    assert_eq!(store.put(b"other", b"v").unwrap_err().code(), ErrorCode::ReadOnly);
    assert_eq!(store.delete(b"k").unwrap_err().code(), ErrorCode::ReadOnly);
    assert_eq!(store.cf_create("users").unwrap_err().code(), ErrorCode::ReadOnly);
    assert_eq!(store.txn_state(), TxnState::Read);
    store.rollback().unwrap();

    assert_eq!(store.get(b"k").unwrap(), b"old");
    assert!(store.get(b"other").unwrap_err().is_not_found());
    assert_eq!(store.cf_list().unwrap(), vec!["default"]);
}

// =============================================================================
// Isolation Between Stores
// =============================================================================

#[test]
fn test_explicit_read_keeps_snapshot() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("test.db");
    let reader = Store::open(&path, Config::default()).unwrap();
    let writer = Store::open(&path, Config::default()).unwrap();
    writer.put(b"k", b"old").unwrap();

    reader.begin(false).unwrap();
    assert_eq!(reader.get(b"k").unwrap(), b"old");

    writer.put(b"k", b"new").unwrap();
    assert_eq!(reader.get(b"k").unwrap(), b"old");

    reader.commit().unwrap();
    assert_eq!(reader.get(b"k").unwrap(), b"new");
}

#[test]
fn test_uncommitted_writes_invisible_to_other_store() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("test.db");
    let first = Store::open(&path, Config::default()).unwrap();
    let second = Store::open(&path, Config::default()).unwrap();

    first.begin(true).unwrap();
    first.put(b"pending", b"1").unwrap();
    assert!(!second.exists(b"pending").unwrap());

    first.commit().unwrap();
    assert!(second.exists(b"pending").unwrap());
}
