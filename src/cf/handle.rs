//! Column family handles
//!
//! A `ColumnFamily` is a cheap, clonable reference to a column family of an
//! open store. The store keeps only weak references to non-default column
//! families, so state for a column family lives exactly as long as some
//! handle (or iterator) does.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{KvError, Result};
use crate::iterator::KvIterator;
use crate::storage::TableId;
use crate::store::StoreShared;

/// Tables of the two hidden TTL indexes of a column family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TtlIndexPair {
    /// user key → expiry
    pub key_index: TableId,
    /// [expiry][user key] → empty
    pub expiry_index: TableId,
}

#[derive(Debug, Default)]
pub(crate) struct CfState {
    /// Hidden index tables, once known to exist
    pub ttl: Option<TtlIndexPair>,

    /// Snapshot generation at which the registry was last probed for `ttl`
    pub ttl_probed_at: Option<u64>,

    /// Snapshot generation at which the key index was seen empty
    pub verified_empty_at: Option<u64>,

    pub dropped: bool,
    pub open_iterators: usize,
}

impl CfState {
    /// Drop everything cached about the TTL indexes
    pub fn forget_ttl(&mut self) {
        self.ttl = None;
        self.ttl_probed_at = None;
        self.verified_empty_at = None;
    }
}

#[derive(Debug)]
pub(crate) struct CfShared {
    pub name: String,
    pub table: TableId,
    pub state: Mutex<CfState>,
}

impl CfShared {
    pub fn new(name: &str, table: TableId) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            table,
            state: Mutex::new(CfState::default()),
        })
    }

    /// Fail with `Protocol` once the column family has been dropped
    pub fn check_live(&self) -> Result<()> {
        if self.state.lock().dropped {
            return Err(KvError::Protocol(format!(
                "column family '{}' has been dropped",
                self.name
            )));
        }
        Ok(())
    }
}

/// Handle to a column family of an open store
#[derive(Clone)]
pub struct ColumnFamily {
    pub(crate) store: Arc<StoreShared>,
    pub(crate) cf: Arc<CfShared>,
}

impl fmt::Debug for ColumnFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnFamily")
            .field("name", &self.cf.name)
            .field("table", &self.cf.table)
            .finish()
    }
}

impl ColumnFamily {
    pub(crate) fn new(store: Arc<StoreShared>, cf: Arc<CfShared>) -> Self {
        Self { store, cf }
    }

    pub fn name(&self) -> &str {
        &self.cf.name
    }

    // =========================================================================
    // Data Operations
    // =========================================================================

    /// Insert or overwrite `key`; any TTL on the key is cleared
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.store.run(|state| state.put(&self.cf, key, value))?;
        self.store.stats.record_put();
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.store.stats.record_get();
        self.store
            .run(|state| state.lookup(&self.cf, key))?
            .map(|(value, _)| value)
            .ok_or(KvError::NotFound)
    }

    /// Remove `key`; `NotFound` when it is absent or already expired
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.store.run(|state| state.delete(&self.cf, key))?;
        self.store.stats.record_delete();
        Ok(())
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.store.run(|state| state.lookup(&self.cf, key))?.is_some())
    }

    // =========================================================================
    // TTL Operations
    // =========================================================================

    /// Write `key` expiring at the absolute time `expiry_ms` (epoch ms)
    ///
    /// An expiry of 0 writes a permanent key.
    pub fn put_with_ttl(&self, key: &[u8], value: &[u8], expiry_ms: i64) -> Result<()> {
        self.store.run(|state| state.put_with_ttl(&self.cf, key, value, expiry_ms))?;
        self.store.stats.record_put();
        Ok(())
    }

    /// Value and remaining lifetime in ms (`NO_TTL` for permanent keys)
    pub fn get_with_ttl(&self, key: &[u8]) -> Result<(Vec<u8>, i64)> {
        self.store.stats.record_get();
        self.store
            .run(|state| state.lookup(&self.cf, key))?
            .ok_or(KvError::NotFound)
    }

    pub fn ttl_remaining(&self, key: &[u8]) -> Result<i64> {
        self.store.run(|state| state.ttl_remaining(&self.cf, key))
    }

    /// Delete every expired key; returns how many data records went away
    pub fn purge_expired(&self) -> Result<u64> {
        self.store.run(|state| state.purge_expired(&self.cf))
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    pub fn iter(&self) -> Result<KvIterator> {
        KvIterator::open(self.clone(), None)
    }

    /// Iterator over keys starting with `prefix`, positioned on the first one
    pub fn prefix_iter(&self, prefix: &[u8]) -> Result<KvIterator> {
        KvIterator::open(self.clone(), Some(prefix.to_vec()))
    }
}
