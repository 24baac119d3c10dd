//! Committed database state
//!
//! A snapshot is immutable once published. Readers pin it with an `Arc`;
//! the committer mutates the published copy in place when nobody else holds
//! it and clones only the tables that are still shared otherwise.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineResult};
use super::table::Table;
use super::{TableId, META_SLOTS};
use crate::wal::Operation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Persisted metadata slots
    pub(crate) meta: [u32; META_SLOTS],

    /// Every committed table id is below this one
    pub(crate) next_table: TableId,

    pub(crate) tables: BTreeMap<TableId, Arc<Table>>,

    /// Commit generation, bumped on every applied write transaction
    #[serde(skip)]
    pub(crate) generation: u64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            meta: [0; META_SLOTS],
            next_table: 1,
            tables: BTreeMap::new(),
            generation: 0,
        }
    }
}

impl Snapshot {
    pub fn meta(&self, slot: usize) -> u32 {
        self.meta.get(slot).copied().unwrap_or(0)
    }

    pub fn table(&self, table: TableId) -> Option<&Arc<Table>> {
        self.tables.get(&table)
    }

    pub fn table_ids(&self) -> impl Iterator<Item = TableId> + '_ {
        self.tables.keys().copied()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Apply one logged operation
    ///
    /// Used both when committing and when replaying the log at open, so every
    /// operation sets state rather than adjusting it.
    pub fn apply(&mut self, op: &Operation) -> EngineResult<()> {
        match op {
            Operation::CreateTable { table } => {
                self.tables.insert(*table, Arc::new(Table::new()));
                if *table >= self.next_table {
                    self.next_table = table + 1;
                }
            }
            Operation::DropTable { table } => {
                self.tables.remove(table);
            }
            Operation::Put { table, key, payload } => {
                let rows = self
                    .tables
                    .get_mut(table)
                    .ok_or(EngineError::NoSuchTable(*table))?;
                Arc::make_mut(rows).insert(key.clone(), payload.clone());
            }
            Operation::Delete { table, key } => {
                let rows = self
                    .tables
                    .get_mut(table)
                    .ok_or(EngineError::NoSuchTable(*table))?;
                Arc::make_mut(rows).remove(key);
            }
            Operation::SetMeta { slot, value } => {
                let entry = self
                    .meta
                    .get_mut(*slot)
                    .ok_or_else(|| EngineError::Corrupt(format!("meta slot {} out of range", slot)))?;
                *entry = *value;
            }
        }
        Ok(())
    }
}
