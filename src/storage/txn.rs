//! Engine transactions
//!
//! ## Model
//! ```text
//!   Read  ──► pinned Arc<Snapshot>            (never blocks, never blocked)
//!
//!   Write ──► base Arc<Snapshot> + overlay    (holds the write slot)
//!                 ├── dirty:   table → key → Some(payload) | None (tombstone)
//!                 ├── created / dropped tables
//!                 └── meta slots
//! ```
//!
//! Commit turns the overlay into a list of logged operations; rollback just
//! drops it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use super::error::{EngineError, EngineResult};
use super::pager::WriteSlot;
use super::snapshot::Snapshot;
use super::table::Table;
use super::{TableId, META_SLOTS};
use crate::wal::Operation;

type Overlay = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// An open engine transaction
pub enum Transaction {
    Read(ReadTxn),
    Write(WriteTxn),
}

pub struct ReadTxn {
    snapshot: Arc<Snapshot>,
}

pub struct WriteTxn {
    base: Arc<Snapshot>,
    meta: [u32; META_SLOTS],
    created: BTreeSet<TableId>,
    dropped: BTreeSet<TableId>,
    dirty: BTreeMap<TableId, Overlay>,
    slot: WriteSlot,
}

impl ReadTxn {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation()
    }
}

impl WriteTxn {
    pub(crate) fn new(base: Arc<Snapshot>, slot: WriteSlot) -> Self {
        Self {
            meta: base.meta,
            base,
            created: BTreeSet::new(),
            dropped: BTreeSet::new(),
            dirty: BTreeMap::new(),
            slot,
        }
    }

    fn has_table(&self, table: TableId) -> bool {
        !self.dropped.contains(&table)
            && (self.created.contains(&table) || self.base.table(table).is_some())
    }

    fn check_table(&self, table: TableId) -> EngineResult<()> {
        if self.has_table(table) {
            Ok(())
        } else {
            Err(EngineError::NoSuchTable(table))
        }
    }

    /// Consume the transaction, producing the operations to log and apply
    ///
    /// Tables created and dropped inside the same transaction leave no trace.
    pub(crate) fn into_operations(self) -> (Vec<Operation>, WriteSlot) {
        let WriteTxn { base, meta, created, dropped, dirty, slot, .. } = self;
        let mut ops = Vec::new();

        for table in created.iter().filter(|t| !dropped.contains(t)) {
            ops.push(Operation::CreateTable { table: *table });
        }
        for (table, rows) in dirty {
            if dropped.contains(&table) {
                continue;
            }
            for (key, payload) in rows {
                ops.push(match payload {
                    Some(payload) => Operation::Put { table, key, payload },
                    None => Operation::Delete { table, key },
                });
            }
        }
        for table in dropped.iter().filter(|t| !created.contains(t)) {
            ops.push(Operation::DropTable { table: *table });
        }
        for (slot_idx, value) in meta.iter().enumerate() {
            if base.meta[slot_idx] != *value {
                ops.push(Operation::SetMeta { slot: slot_idx, value: *value });
            }
        }
        (ops, slot)
    }
}

impl Transaction {
    pub fn is_write(&self) -> bool {
        matches!(self, Transaction::Write(_))
    }

    /// Generation of the snapshot this transaction reads from
    pub fn generation(&self) -> u64 {
        match self {
            Transaction::Read(txn) => txn.snapshot.generation(),
            Transaction::Write(txn) => txn.base.generation(),
        }
    }

    fn writer(&mut self) -> EngineResult<&mut WriteTxn> {
        match self {
            Transaction::Write(txn) => Ok(txn),
            Transaction::Read(_) => Err(EngineError::NoWriteTransaction),
        }
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    pub fn meta(&self, slot: usize) -> u32 {
        match self {
            Transaction::Read(txn) => txn.snapshot.meta(slot),
            Transaction::Write(txn) => txn.meta.get(slot).copied().unwrap_or(0),
        }
    }

    pub fn set_meta(&mut self, slot: usize, value: u32) -> EngineResult<()> {
        let txn = self.writer()?;
        let entry = txn
            .meta
            .get_mut(slot)
            .ok_or_else(|| EngineError::Misuse(format!("meta slot {} out of range", slot)))?;
        *entry = value;
        Ok(())
    }

    // =========================================================================
    // Tables
    // =========================================================================

    pub fn has_table(&self, table: TableId) -> bool {
        match self {
            Transaction::Read(txn) => txn.snapshot.table(table).is_some(),
            Transaction::Write(txn) => txn.has_table(table),
        }
    }

    /// Every live table, ascending
    pub fn table_ids(&self) -> Vec<TableId> {
        match self {
            Transaction::Read(txn) => txn.snapshot.table_ids().collect(),
            Transaction::Write(txn) => txn
                .base
                .table_ids()
                .chain(txn.created.iter().copied())
                .filter(|t| !txn.dropped.contains(t))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }

    pub fn create_table(&mut self) -> EngineResult<TableId> {
        let txn = self.writer()?;
        let table = txn.slot.allocate_table()?;
        txn.created.insert(table);
        Ok(table)
    }

    pub fn drop_table(&mut self, table: TableId) -> EngineResult<()> {
        let txn = self.writer()?;
        txn.check_table(table)?;
        txn.dropped.insert(table);
        txn.dirty.remove(&table);
        Ok(())
    }

    // =========================================================================
    // Rows
    // =========================================================================

    pub fn get(&self, table: TableId, key: &[u8]) -> EngineResult<Option<&[u8]>> {
        match self {
            Transaction::Read(txn) => {
                let rows = txn.snapshot.table(table).ok_or(EngineError::NoSuchTable(table))?;
                Ok(rows.get(key))
            }
            Transaction::Write(txn) => {
                txn.check_table(table)?;
                if let Some(slot) = txn.dirty.get(&table).and_then(|rows| rows.get(key)) {
                    return Ok(slot.as_deref());
                }
                Ok(txn.base.table(table).and_then(|rows| rows.get(key)))
            }
        }
    }

    /// First visible row at or after `from`
    pub fn seek(
        &self,
        table: TableId,
        from: Bound<&[u8]>,
    ) -> EngineResult<Option<(&[u8], &[u8])>> {
        match self {
            Transaction::Read(txn) => {
                let rows = txn.snapshot.table(table).ok_or(EngineError::NoSuchTable(table))?;
                Ok(rows.range_from(from).next())
            }
            Transaction::Write(txn) => {
                txn.check_table(table)?;
                let base = txn.base.table(table).map(|rows| rows.as_ref());
                Ok(seek_merged(base, txn.dirty.get(&table), from))
            }
        }
    }

    pub fn insert(&mut self, table: TableId, key: &[u8], payload: &[u8]) -> EngineResult<()> {
        let txn = self.writer()?;
        txn.check_table(table)?;
        let mut owned = Vec::new();
        owned.try_reserve_exact(payload.len()).map_err(|_| EngineError::NoMem)?;
        owned.extend_from_slice(payload);
        txn.dirty.entry(table).or_default().insert(key.to_vec(), Some(owned));
        Ok(())
    }

    pub fn delete(&mut self, table: TableId, key: &[u8]) -> EngineResult<()> {
        let txn = self.writer()?;
        txn.check_table(table)?;
        let in_base = txn.base.table(table).map_or(false, |rows| rows.get(key).is_some());
        let rows = txn.dirty.entry(table).or_default();
        if in_base {
            rows.insert(key.to_vec(), None);
        } else {
            rows.remove(key);
        }
        Ok(())
    }

    /// Number of visible rows in a table
    pub fn row_count(&self, table: TableId) -> EngineResult<usize> {
        let mut count = 0;
        let mut cursor = super::Cursor::new(table);
        let mut valid = cursor.first(self)?;
        while valid {
            count += 1;
            valid = cursor.next(self)?;
        }
        Ok(count)
    }
}

/// Merge a base table with an overlay; overlay entries shadow base rows
fn seek_merged<'a>(
    base: Option<&'a Table>,
    overlay: Option<&'a Overlay>,
    from: Bound<&[u8]>,
) -> Option<(&'a [u8], &'a [u8])> {
    let mut base_rows = base.into_iter().flat_map(|rows| rows.range_from(from)).peekable();
    let mut pending = overlay
        .into_iter()
        .flat_map(|rows| rows.range::<[u8], _>((from, Bound::Unbounded)))
        .map(|(k, v)| (k.as_slice(), v.as_deref()))
        .peekable();

    loop {
        let next_base = base_rows.peek().copied();
        let next_pending = pending.peek().copied();
        match (next_base, next_pending) {
            (None, None) => return None,
            (Some(row), None) => return Some(row),
            (None, Some((key, slot))) => {
                pending.next();
                if let Some(payload) = slot {
                    return Some((key, payload));
                }
            }
            (Some((base_key, base_payload)), Some((key, slot))) => match base_key.cmp(key) {
                Ordering::Less => return Some((base_key, base_payload)),
                Ordering::Equal => {
                    base_rows.next();
                    pending.next();
                    if let Some(payload) = slot {
                        return Some((key, payload));
                    }
                }
                Ordering::Greater => {
                    pending.next();
                    if let Some(payload) = slot {
                        return Some((key, payload));
                    }
                }
            },
        }
    }
}
