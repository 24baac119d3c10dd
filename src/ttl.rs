//! TTL Subsystem
//!
//! Per-key expiry backed by two hidden column families per data column
//! family, created the first time a key there gets an expiry:
//!
//! ```text
//! __ttl_k__<cf>   user_key          → expiry (8, BE)    point lookups
//! __ttl_e__<cf>   [expiry][user_key] → (empty)           ordered by expiry
//! ```
//!
//! Reads check the key index and delete expired keys on the spot. Purge
//! walks the expiry index from the oldest entry and stops at the first one
//! still alive, so its cost follows the number of expired keys.
//!
//! ## Skipping the lookup
//! A read skips the key index when that index was seen empty in a read
//! snapshot of the same generation. Snapshots never change once committed,
//! so the shortcut cannot hide an entry; write transactions always look.

use std::ops::Bound;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::cf::{registry, CfShared, CfState, TtlIndexPair};
use crate::codec::{
    decode_expiry, decode_record, encode_expiry, encode_record, expiry_index_key,
    split_expiry_index_key, EXPIRY_LEN, RECORD_SCRATCH_SIZE,
};
use crate::error::{KvError, Result};
use crate::storage::{Cursor, TableId, Transaction};
use crate::store::{validate_key, validate_value, StoreState};

/// Remaining lifetime reported for keys without an expiry
pub const NO_TTL: i64 = -1;

/// Expired entries handled per purge transaction
pub const PURGE_BATCH_SIZE: usize = 256;

const KEY_INDEX_PREFIX: &str = "__ttl_k__";
const EXPIRY_INDEX_PREFIX: &str = "__ttl_e__";

/// Current time in epoch milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub(crate) fn key_index_name(cf: &str) -> String {
    format!("{}{}", KEY_INDEX_PREFIX, cf)
}

pub(crate) fn expiry_index_name(cf: &str) -> String {
    format!("{}{}", EXPIRY_INDEX_PREFIX, cf)
}

/// Which hidden index a column family name denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexKind {
    Key,
    Expiry,
}

pub(crate) fn index_kind(name: &str) -> Option<IndexKind> {
    if name.starts_with(KEY_INDEX_PREFIX) {
        Some(IndexKind::Key)
    } else if name.starts_with(EXPIRY_INDEX_PREFIX) {
        Some(IndexKind::Expiry)
    } else {
        None
    }
}

impl IndexKind {
    /// Describe what is wrong with an index row, if anything
    pub(crate) fn check_row(self, key: &[u8], value: &[u8]) -> Option<String> {
        match self {
            IndexKind::Key if value.len() != EXPIRY_LEN => {
                Some(format!("key index value of {} bytes", value.len()))
            }
            IndexKind::Expiry if key.len() < EXPIRY_LEN => {
                Some(format!("expiry index key of {} bytes", key.len()))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Index Pair Resolution
// =============================================================================

/// The column family's index tables as visible to `txn`, if they exist
pub(crate) fn resolve_pair(
    txn: &Transaction,
    registry_table: TableId,
    cf: &CfShared,
    state: &mut CfState,
) -> Result<Option<TtlIndexPair>> {
    if let Some(pair) = state.ttl {
        if txn.has_table(pair.key_index) && txn.has_table(pair.expiry_index) {
            return Ok(Some(pair));
        }
        state.ttl = None;
        state.ttl_probed_at = None;
    }

    let generation = txn.generation();
    if state.ttl_probed_at == Some(generation) {
        return Ok(None);
    }
    let key_index = registry::lookup(txn, registry_table, &key_index_name(&cf.name))?;
    let expiry_index = registry::lookup(txn, registry_table, &expiry_index_name(&cf.name))?;
    state.ttl_probed_at = Some(generation);
    state.ttl = match (key_index, expiry_index) {
        (Some(key_index), Some(expiry_index)) => Some(TtlIndexPair { key_index, expiry_index }),
        _ => None,
    };
    Ok(state.ttl)
}

/// Like [`resolve_pair`], but `None` when the key index is known to be empty
pub(crate) fn active_pair(
    txn: &Transaction,
    registry_table: TableId,
    cf: &CfShared,
    state: &mut CfState,
) -> Result<Option<TtlIndexPair>> {
    let pair = match resolve_pair(txn, registry_table, cf, state)? {
        Some(pair) => pair,
        None => return Ok(None),
    };
    if txn.is_write() {
        return Ok(Some(pair));
    }

    let generation = txn.generation();
    if state.verified_empty_at == Some(generation) {
        return Ok(None);
    }
    if txn.seek(pair.key_index, Bound::Unbounded)?.is_none() {
        state.verified_empty_at = Some(generation);
        return Ok(None);
    }
    Ok(Some(pair))
}

/// Create the hidden index column families unless they exist
///
/// Runs inside the caller's write transaction.
pub(crate) fn materialize_pair(
    txn: &mut Transaction,
    registry_table: TableId,
    cf: &CfShared,
    state: &mut CfState,
) -> Result<TtlIndexPair> {
    if let Some(pair) = resolve_pair(txn, registry_table, cf, state)? {
        return Ok(pair);
    }
    let key_index = registry::create_or_open(txn, registry_table, &key_index_name(&cf.name))?;
    let expiry_index = registry::create_or_open(txn, registry_table, &expiry_index_name(&cf.name))?;
    let pair = TtlIndexPair { key_index, expiry_index };
    state.ttl = Some(pair);
    state.ttl_probed_at = Some(txn.generation());
    debug!(cf = %cf.name, key_index, expiry_index, "created TTL indexes");
    Ok(pair)
}

// =============================================================================
// Index Rows
// =============================================================================

/// Expiry recorded for `key`
pub(crate) fn lookup_expiry(txn: &Transaction, pair: TtlIndexPair, key: &[u8]) -> Result<Option<i64>> {
    match txn.get(pair.key_index, key)? {
        Some(payload) => {
            let (_, value) = decode_record(payload)?;
            Ok(Some(decode_expiry(value)?))
        }
        None => Ok(None),
    }
}

fn insert_index_row(txn: &mut Transaction, table: TableId, key: &[u8], value: &[u8]) -> Result<()> {
    let mut scratch = [0u8; RECORD_SCRATCH_SIZE];
    let blob = encode_record(key, value, &mut scratch)?;
    txn.insert(table, key, &blob)?;
    Ok(())
}

/// Record both index entries for `key`
pub(crate) fn write_index_entries(
    txn: &mut Transaction,
    pair: TtlIndexPair,
    key: &[u8],
    expiry: i64,
) -> Result<()> {
    insert_index_row(txn, pair.key_index, key, &encode_expiry(expiry))?;
    insert_index_row(txn, pair.expiry_index, &expiry_index_key(expiry, key), &[])
}

/// Remove both index entries for `key`; returns the expiry they held
pub(crate) fn remove_index_entries(
    txn: &mut Transaction,
    pair: TtlIndexPair,
    key: &[u8],
) -> Result<Option<i64>> {
    let expiry = match lookup_expiry(txn, pair, key)? {
        Some(expiry) => expiry,
        None => return Ok(None),
    };
    txn.delete(pair.key_index, key)?;
    txn.delete(pair.expiry_index, &expiry_index_key(expiry, key))?;
    Ok(Some(expiry))
}

/// Up to a batch of expiry-index keys that are due at `now`
fn collect_expired(txn: &Transaction, cursor: &mut Cursor, now: i64) -> Result<Vec<Vec<u8>>> {
    let mut batch = Vec::new();
    let mut valid = cursor.first(txn)?;
    while valid && batch.len() < PURGE_BATCH_SIZE {
        let composite = match cursor.key() {
            Some(composite) => composite,
            None => break,
        };
        let (expiry, _) = split_expiry_index_key(composite)?;
        if expiry > now {
            break;
        }
        batch.push(composite.to_vec());
        valid = cursor.next(txn)?;
    }
    Ok(batch)
}

// =============================================================================
// Store Operations
// =============================================================================

impl StoreState {
    /// Expiry of `key` in the open transaction
    pub(crate) fn expiry_of(&mut self, cf: &CfShared, key: &[u8]) -> Result<Option<i64>> {
        let txn = self.txn.txn()?;
        let mut cf_state = cf.state.lock();
        match active_pair(txn, self.registry_table, cf, &mut cf_state)? {
            Some(pair) => lookup_expiry(txn, pair, key),
            None => Ok(None),
        }
    }

    /// Drop the TTL of `key` (write transaction)
    pub(crate) fn clear_ttl(&mut self, cf: &CfShared, key: &[u8]) -> Result<()> {
        let registry_table = self.registry_table;
        let txn = self.txn.txn_mut()?;
        let mut cf_state = cf.state.lock();
        if let Some(pair) = active_pair(txn, registry_table, cf, &mut cf_state)? {
            remove_index_entries(txn, pair, key)?;
        }
        Ok(())
    }

    /// Delete `key` with its index entries (write transaction); returns
    /// whether a data record existed
    pub(crate) fn delete_entry(&mut self, cf: &CfShared, key: &[u8]) -> Result<bool> {
        let registry_table = self.registry_table;
        let txn = self.txn.txn_mut()?;
        let existed = txn.get(cf.table, key)?.is_some();
        if existed {
            txn.delete(cf.table, key)?;
        }
        let mut cf_state = cf.state.lock();
        if let Some(pair) = resolve_pair(txn, registry_table, cf, &mut cf_state)? {
            remove_index_entries(txn, pair, key)?;
        }
        Ok(existed)
    }

    /// Lazily delete an expired key
    ///
    /// Contention and read-only stores leave the key in place; callers report
    /// it as missing either way.
    pub(crate) fn expire(&mut self, cf: &CfShared, key: &[u8]) -> Result<()> {
        if !self.can_write_lazily() {
            return Ok(());
        }
        match self.write_op(|s| s.delete_entry(cf, key)) {
            Ok(_) => {
                debug!(cf = %cf.name, "lazily expired key");
                Ok(())
            }
            Err(e @ (KvError::Busy(_) | KvError::Locked(_) | KvError::ReadOnly(_))) => {
                debug!(cf = %cf.name, error = %e, "lazy expiry deferred");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Value and remaining lifetime of a live key
    pub(crate) fn lookup(&mut self, cf: &CfShared, key: &[u8]) -> Result<Option<(Vec<u8>, i64)>> {
        validate_key(key)?;
        cf.check_live()?;
        self.prepare_read()?;

        let now = now_ms();
        let expiry = self.expiry_of(cf, key)?;
        if let Some(expiry) = expiry {
            if expiry <= now {
                self.expire(cf, key)?;
                return Ok(None);
            }
        }
        let value = match self.read_value(cf, key)? {
            Some(value) => value,
            None => return Ok(None),
        };
        let remaining = expiry.map_or(NO_TTL, |expiry| expiry - now);
        Ok(Some((value, remaining)))
    }

    pub(crate) fn put_with_ttl(
        &mut self,
        cf: &CfShared,
        key: &[u8],
        value: &[u8],
        expiry_ms: i64,
    ) -> Result<()> {
        if expiry_ms < 0 {
            return Err(KvError::InvalidArgument(format!("negative expiry {}", expiry_ms)));
        }
        if expiry_ms == 0 {
            return self.put(cf, key, value);
        }
        validate_key(key)?;
        validate_value(value)?;
        cf.check_live()?;

        self.write_op(|s| {
            s.insert_record(cf.table, key, value)?;
            let registry_table = s.registry_table;
            let txn = s.txn.txn_mut()?;
            let mut cf_state = cf.state.lock();
            let pair = materialize_pair(txn, registry_table, cf, &mut cf_state)?;
            remove_index_entries(txn, pair, key)?;
            write_index_entries(txn, pair, key, expiry_ms)
        })
    }

    /// Remaining lifetime of `key`
    ///
    /// `NO_TTL` for permanent keys, `0` when this call found the key expired
    /// and removed it.
    pub(crate) fn ttl_remaining(&mut self, cf: &CfShared, key: &[u8]) -> Result<i64> {
        validate_key(key)?;
        cf.check_live()?;
        self.prepare_read()?;

        let now = now_ms();
        let expiry = self.expiry_of(cf, key)?;
        if self.txn.read_payload(cf.table, key)?.is_none() {
            return Err(KvError::NotFound);
        }
        match expiry {
            None => Ok(NO_TTL),
            Some(expiry) if expiry <= now => {
                self.expire(cf, key)?;
                Ok(0)
            }
            Some(expiry) => Ok(expiry - now),
        }
    }

    /// Delete every expired key of `cf`
    ///
    /// Each round reads one batch from the expiry index and deletes it in a
    /// separate write transaction (or in the caller's open one).
    pub(crate) fn purge_expired(&mut self, cf: &CfShared) -> Result<u64> {
        cf.check_live()?;
        let mut purged = 0u64;
        loop {
            self.prepare_read()?;
            let pair = {
                let txn = self.txn.txn()?;
                let mut cf_state = cf.state.lock();
                resolve_pair(txn, self.registry_table, cf, &mut cf_state)?
            };
            let pair = match pair {
                Some(pair) => pair,
                None => break,
            };

            let now = now_ms();
            let batch = self
                .txn
                .with_cursor(pair.expiry_index, |txn, cursor| collect_expired(txn, cursor, now))?;
            if batch.is_empty() {
                break;
            }
            let full = batch.len() == PURGE_BATCH_SIZE;
            let deleted = self.write_op(|s| s.purge_batch(cf, pair, &batch))?;
            debug!(cf = %cf.name, entries = batch.len(), deleted, "purged TTL batch");
            purged += deleted;
            if !full {
                break;
            }
        }
        Ok(purged)
    }

    fn purge_batch(&mut self, cf: &CfShared, pair: TtlIndexPair, batch: &[Vec<u8>]) -> Result<u64> {
        let txn = self.txn.txn_mut()?;
        if !txn.has_table(pair.key_index) || !txn.has_table(pair.expiry_index) {
            return Ok(0);
        }
        let mut deleted = 0;
        for composite in batch {
            let (expiry, key) = split_expiry_index_key(composite)?;
            txn.delete(pair.expiry_index, composite)?;
            // A rewrite with a later expiry owns the key index entry now
            if lookup_expiry(txn, pair, key)? != Some(expiry) {
                continue;
            }
            txn.delete(pair.key_index, key)?;
            if txn.get(cf.table, key)?.is_some() {
                txn.delete(cf.table, key)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
