//! Tests for key expiry
//!
//! These tests verify:
//! - TTL keys are readable before and gone after their expiry
//! - Expired keys are deleted lazily on read
//! - ttl_remaining reports NO_TTL, a countdown, or 0 for a just-expired key
//! - A plain put makes a key permanent again
//! - purge_expired removes exactly the expired keys
//! - TTL state survives reopen

use std::thread::sleep;
use std::time::Duration;

use kvlite::{now_ms, Config, ErrorCode, KvError, Store, NO_TTL};
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

/// Absolute expiry `ms` milliseconds from now
fn in_ms(ms: i64) -> i64 {
    now_ms() + ms
}

/// Absolute expiry already in the past
fn expired() -> i64 {
    now_ms() - 1_000
}

// =============================================================================
// Expiry
// =============================================================================

#[test]
fn test_ttl_key_expires() {
    let store = memory_store();
    store.put_with_ttl(b"k", b"v", in_ms(50)).unwrap();

    let (value, remaining) = store.get_with_ttl(b"k").unwrap();
    assert_eq!(value, b"v");
    assert!(remaining > 0 && remaining <= 50);

    sleep(Duration::from_millis(80));

    assert!(store.get_with_ttl(b"k").unwrap_err().is_not_found());
    assert!(store.get(b"k").unwrap_err().is_not_found());
    assert!(!store.exists(b"k").unwrap());
}

#[test]
fn test_expired_key_lazily_deleted() {
    let store = memory_store();
    store.put_with_ttl(b"k", b"v", expired()).unwrap();

    assert!(store.get(b"k").unwrap_err().is_not_found());

    // The lazy delete already removed the record, so a purge finds nothing
    assert_eq!(store.purge_expired().unwrap(), 0);
    assert!(store.delete(b"k").unwrap_err().is_not_found());
}

#[test]
fn test_permanent_key_reports_no_ttl() {
    let store = memory_store();
    store.put(b"k", b"v").unwrap();

    let (value, remaining) = store.get_with_ttl(b"k").unwrap();
    assert_eq!(value, b"v");
    assert_eq!(remaining, NO_TTL);
    assert_eq!(store.ttl_remaining(b"k").unwrap(), NO_TTL);
}

#[test]
fn test_permanent_keys_unaffected_by_ttl_keys() {
    let store = memory_store();
    store.put(b"permanent", b"p").unwrap();
    store.put_with_ttl(b"short", b"s", expired()).unwrap();

    assert_eq!(store.get_with_ttl(b"permanent").unwrap().1, NO_TTL);
    assert!(store.get(b"short").unwrap_err().is_not_found());
}

// =============================================================================
// ttl_remaining
// =============================================================================

#[test]
fn test_ttl_remaining_counts_down() {
    let store = memory_store();
    store.put_with_ttl(b"k", b"v", in_ms(60_000)).unwrap();

    let first = store.ttl_remaining(b"k").unwrap();
    assert!(first > 0 && first <= 60_000);
    sleep(Duration::from_millis(20));
    assert!(store.ttl_remaining(b"k").unwrap() < first);
}

#[test]
fn test_ttl_remaining_expired_then_missing() {
    let store = memory_store();
    store.put_with_ttl(b"k", b"v", expired()).unwrap();

    assert_eq!(store.ttl_remaining(b"k").unwrap(), 0);
    assert_eq!(store.ttl_remaining(b"k").unwrap_err().code(), ErrorCode::NotFound);
}

#[test]
fn test_ttl_remaining_missing_key() {
    let store = memory_store();
    assert!(store.ttl_remaining(b"nope").unwrap_err().is_not_found());
}

// =============================================================================
// Rewrites
// =============================================================================

#[test]
fn test_plain_put_clears_ttl() {
    let store = memory_store();
    store.put_with_ttl(b"k", b"v1", in_ms(50)).unwrap();
    store.put(b"k", b"v2").unwrap();

    assert_eq!(store.ttl_remaining(b"k").unwrap(), NO_TTL);
    sleep(Duration::from_millis(80));
    assert_eq!(store.get(b"k").unwrap(), b"v2");
}

#[test]
fn test_zero_expiry_makes_key_permanent() {
    let store = memory_store();
    store.put_with_ttl(b"k", b"v1", in_ms(50)).unwrap();
    store.put_with_ttl(b"k", b"v2", 0).unwrap();

    assert_eq!(store.get_with_ttl(b"k").unwrap(), (b"v2".to_vec(), NO_TTL));
}

#[test]
fn test_negative_expiry_rejected() {
    let store = memory_store();
    assert!(matches!(
        store.put_with_ttl(b"k", b"v", -5),
        Err(KvError::InvalidArgument(_))
    ));
    assert!(!store.exists(b"k").unwrap());
}

#[test]
fn test_extending_ttl_replaces_old_expiry() {
    let store = memory_store();
    store.put_with_ttl(b"k", b"v", in_ms(30)).unwrap();
    store.put_with_ttl(b"k", b"v", in_ms(60_000)).unwrap();

    sleep(Duration::from_millis(60));

    assert_eq!(store.purge_expired().unwrap(), 0);
    assert_eq!(store.get(b"k").unwrap(), b"v");
    assert!(store.ttl_remaining(b"k").unwrap() > 30_000);
    store.integrity_check().unwrap();
}

#[test]
fn test_shortening_ttl_expires_sooner() {
    let store = memory_store();
    store.put_with_ttl(b"k", b"v", in_ms(60_000)).unwrap();
    store.put_with_ttl(b"k", b"v", expired()).unwrap();

    assert_eq!(store.purge_expired().unwrap(), 1);
    assert!(store.get(b"k").unwrap_err().is_not_found());
}

// =============================================================================
// Purge
// =============================================================================

#[test]
fn test_purge_expired_counts() {
    let store = memory_store();
    let expired_keys = 7;
    let live_keys = 5;
    for i in 0..expired_keys {
        store.put_with_ttl(format!("old{}", i).as_bytes(), b"x", expired()).unwrap();
    }
    for i in 0..live_keys {
        store.put_with_ttl(format!("new{}", i).as_bytes(), b"y", in_ms(60_000)).unwrap();
    }
    store.put(b"permanent", b"z").unwrap();

    assert_eq!(store.purge_expired().unwrap(), expired_keys);

    for i in 0..expired_keys {
        assert!(store.get(format!("old{}", i).as_bytes()).unwrap_err().is_not_found());
    }
    for i in 0..live_keys {
        assert_eq!(store.get(format!("new{}", i).as_bytes()).unwrap(), b"y");
    }
    assert_eq!(store.get(b"permanent").unwrap(), b"z");
    assert_eq!(store.purge_expired().unwrap(), 0);
}

#[test]
fn test_purge_spans_multiple_batches() {
    let store = memory_store();
    let count = 600u64;

    store.begin(true).unwrap();
    for i in 0..count {
        store.put_with_ttl(format!("k{:04}", i).as_bytes(), b"v", expired()).unwrap();
    }
    store.commit().unwrap();

    assert_eq!(store.purge_expired().unwrap(), count);
    assert_eq!(store.purge_expired().unwrap(), 0);
    store.integrity_check().unwrap();
}

#[test]
fn test_purge_without_ttl_keys() {
    let store = memory_store();
    store.put(b"k", b"v").unwrap();
    assert_eq!(store.purge_expired().unwrap(), 0);
}

#[test]
fn test_purge_in_user_cf() {
    let store = memory_store();
    let sess = store.cf_create("sessions").unwrap();
    sess.put_with_ttl(b"a", b"1", expired()).unwrap();
    sess.put_with_ttl(b"b", b"2", in_ms(60_000)).unwrap();
    store.put_with_ttl(b"a", b"default", expired()).unwrap();

    assert_eq!(sess.purge_expired().unwrap(), 1);
    assert_eq!(sess.get(b"b").unwrap(), b"2");
    assert_eq!(store.purge_expired().unwrap(), 1);
}

#[test]
fn test_delete_removes_ttl_entries() {
    let store = memory_store();
    store.put_with_ttl(b"k", b"v", in_ms(60_000)).unwrap();
    store.delete(b"k").unwrap();

    store.put(b"k", b"again").unwrap();
    assert_eq!(store.ttl_remaining(b"k").unwrap(), NO_TTL);
    store.integrity_check().unwrap();
}

// =============================================================================
// Transactions and Persistence
// =============================================================================

#[test]
fn test_ttl_write_rolled_back() {
    let store = memory_store();

    store.begin(true).unwrap();
    store.put_with_ttl(b"k", b"v", in_ms(60_000)).unwrap();
    store.rollback().unwrap();

    assert!(!store.exists(b"k").unwrap());
    store.put(b"k", b"plain").unwrap();
    assert_eq!(store.ttl_remaining(b"k").unwrap(), NO_TTL);
}

#[test]
fn test_rolled_back_ttl_indexes_do_not_leak_into_new_cfs() {
    let store = memory_store();
    let first = store.cf_create("first").unwrap();

    store.begin(true).unwrap();
    first.put_with_ttl(b"k", b"v", in_ms(60_000)).unwrap();
    store.rollback().unwrap();

    // Tables created afterwards must not alias the discarded index tables
    let second = store.cf_create("second").unwrap();
    let third = store.cf_create("third").unwrap();
    second.put(b"x", b"hello").unwrap();
    third.put(b"y", b"world").unwrap();

    first.put(b"x", b"mine").unwrap();
    assert_eq!(first.get(b"x").unwrap(), b"mine");
    assert_eq!(first.ttl_remaining(b"x").unwrap(), NO_TTL);
    assert_eq!(second.get(b"x").unwrap(), b"hello");
    assert_eq!(third.get(b"y").unwrap(), b"world");

    first.put_with_ttl(b"t", b"v", in_ms(60_000)).unwrap();
    assert!(first.ttl_remaining(b"t").unwrap() > 0);
    assert!(!second.exists(b"t").unwrap());
    assert!(!third.exists(b"t").unwrap());

    assert!(!store.is_corrupted());
    store.integrity_check().unwrap();
}

#[test]
fn test_expired_key_kept_inside_explicit_read() {
    let store = memory_store();
    store.put_with_ttl(b"k", b"v", expired()).unwrap();

    store.begin(false).unwrap();
    assert!(store.get(b"k").unwrap_err().is_not_found());
    store.commit().unwrap();

    // Reading in an explicit read transaction leaves the record for purge
    assert_eq!(store.purge_expired().unwrap(), 1);
}

#[test]
fn test_ttl_survives_reopen() {
    let (temp, store) = setup_temp_store();
    store.put_with_ttl(b"long", b"v", in_ms(60_000)).unwrap();
    store.put_with_ttl(b"short", b"v", in_ms(30)).unwrap();
    store.close();

    sleep(Duration::from_millis(60));

    let store = Store::open(temp.path().join("test.db"), Config::default()).unwrap();
    assert!(store.ttl_remaining(b"long").unwrap() > 0);
    assert!(store.get(b"short").unwrap_err().is_not_found());
    store.integrity_check().unwrap();
}
