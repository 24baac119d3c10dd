//! Transaction Controller
//!
//! Owns the store-wide transaction state and keeps a read transaction open
//! between operations so that reads do not pay for begin/commit.
//!
//! ## States
//! ```text
//!            begin(read)                    begin(write)
//!   None ─────────────────► Read ──────────────────────────► Write
//!    ▲  (persistent, reopened  │  (read released first; the      │
//!    │   after every commit)   │   engine cannot upgrade it)     │
//!    └──── close ◄─────────────┴──────── commit / rollback ◄─────┘
//! ```
//!
//! Every state change goes through [`TxnController::transition`], which also
//! drops the cached cursors: a cursor belongs to the transaction it was last
//! positioned in.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::CheckpointMode;
use crate::error::{KvError, Result};
use crate::storage::{Connection, Cursor, TableId, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    None,
    Read,
    Write,
}

pub(crate) struct TxnController {
    current: Option<Transaction>,

    /// Opened by the caller's `begin` rather than kept by the store
    explicit: bool,

    /// Write commits since the last automatic checkpoint
    commits: u32,

    /// Commits between automatic passive checkpoints (0 = never)
    auto_checkpoint: u32,

    /// A write transaction ended without its changes being published
    discarded_write: bool,

    cursors: HashMap<TableId, Cursor>,
}

impl TxnController {
    pub fn new(auto_checkpoint: u32) -> Self {
        Self {
            current: None,
            explicit: false,
            commits: 0,
            auto_checkpoint,
            discarded_write: false,
            cursors: HashMap::new(),
        }
    }

    pub fn state(&self) -> TxnState {
        match &self.current {
            None => TxnState::None,
            Some(txn) if txn.is_write() => TxnState::Write,
            Some(_) => TxnState::Read,
        }
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Whether a write transaction was discarded since the last call
    pub fn take_discarded_write(&mut self) -> bool {
        std::mem::take(&mut self.discarded_write)
    }

    pub fn txn(&self) -> Result<&Transaction> {
        self.current.as_ref().ok_or(KvError::NoTransaction)
    }

    pub fn txn_mut(&mut self) -> Result<&mut Transaction> {
        self.current.as_mut().ok_or(KvError::NoTransaction)
    }

    /// Swap the open transaction, invalidating every cached cursor
    fn transition(&mut self, next: Option<Transaction>) -> Option<Transaction> {
        self.cursors.clear();
        std::mem::replace(&mut self.current, next)
    }

    /// Reopen the persistent read if nothing is open
    pub fn open_persistent_read(&mut self, conn: &Connection) {
        if self.current.is_none() {
            self.transition(Some(conn.begin_read()));
        }
    }

    /// Make sure some transaction is open; returns whether one was opened
    pub fn ensure_read(&mut self, conn: &Connection) -> bool {
        if self.current.is_some() {
            return false;
        }
        self.transition(Some(conn.begin_read()));
        true
    }

    /// Move the persistent read to the newest commit of another connection
    pub fn refresh_if_stale(&mut self, conn: &Connection) {
        let stale = match &self.current {
            Some(txn) => !txn.is_write() && !self.explicit && conn.is_stale(txn),
            None => false,
        };
        if stale {
            self.transition(Some(conn.begin_read()));
        }
    }

    // =========================================================================
    // Explicit Transactions
    // =========================================================================

    pub fn begin(&mut self, conn: &Connection, write: bool) -> Result<()> {
        match (self.state(), write) {
            (TxnState::Write, _) => Err(KvError::TransactionActive),
            (TxnState::Read, false) => {
                self.explicit = true;
                Ok(())
            }
            (TxnState::None, false) => {
                self.transition(Some(conn.begin_read()));
                self.explicit = true;
                Ok(())
            }
            (_, true) => {
                self.open_write(conn)?;
                self.explicit = true;
                Ok(())
            }
        }
    }

    /// Release any read and take the write slot
    ///
    /// On failure the persistent read is restored.
    fn open_write(&mut self, conn: &Connection) -> Result<()> {
        self.transition(None);
        self.explicit = false;
        match conn.begin_write() {
            Ok(txn) => {
                self.transition(Some(txn));
                Ok(())
            }
            Err(e) => {
                self.open_persistent_read(conn);
                Err(e.into())
            }
        }
    }

    pub fn commit(&mut self, conn: &Connection) -> Result<()> {
        let txn = self.transition(None).ok_or(KvError::NoTransaction)?;
        self.explicit = false;
        let was_write = txn.is_write();
        let result = conn.commit(txn);

        if was_write {
            if result.is_ok() {
                self.commits += 1;
                self.maybe_checkpoint(conn);
            } else {
                self.discarded_write = true;
            }
        }
        self.open_persistent_read(conn);
        result.map_err(KvError::from)
    }

    pub fn rollback(&mut self, conn: &Connection) {
        let txn = match self.transition(None) {
            Some(txn) => txn,
            None => return,
        };
        self.discarded_write |= txn.is_write();
        conn.rollback(txn);
        self.explicit = false;
        self.open_persistent_read(conn);
    }

    /// Drop whatever is open without reopening anything
    pub fn release(&mut self, conn: &Connection) {
        if let Some(txn) = self.transition(None) {
            if txn.is_write() {
                debug!("rolling back open write transaction");
                self.discarded_write = true;
            }
            conn.rollback(txn);
        }
        self.explicit = false;
    }

    // =========================================================================
    // Implicit Write Transactions
    // =========================================================================

    /// Open a write transaction for one mutating call unless the caller
    /// already holds one; returns whether this call owns it
    ///
    /// Refused inside an explicit read transaction, which the caller may
    /// still roll back.
    pub fn begin_autocommit_write(&mut self, conn: &Connection) -> Result<bool> {
        match self.state() {
            TxnState::Write => return Ok(false),
            TxnState::Read if self.explicit => {
                return Err(KvError::ReadOnly("read-only transaction".to_string()))
            }
            _ => {}
        }
        self.open_write(conn)?;
        Ok(true)
    }

    /// Commit an owned write transaction on success, roll it back on error
    pub fn finish_autocommit<T>(&mut self, conn: &Connection, owned: bool, result: Result<T>) -> Result<T> {
        if !owned {
            return result;
        }
        match result {
            Ok(value) => {
                self.commit(conn)?;
                Ok(value)
            }
            Err(e) => {
                self.rollback(conn);
                Err(e)
            }
        }
    }

    // =========================================================================
    // Checkpoints
    // =========================================================================

    fn maybe_checkpoint(&mut self, conn: &Connection) {
        if self.auto_checkpoint == 0 || self.commits < self.auto_checkpoint {
            return;
        }
        self.commits = 0;
        match conn.checkpoint(CheckpointMode::Passive) {
            Ok((log, done)) => debug!(log, done, "automatic checkpoint"),
            Err(e) => warn!(error = %e, "automatic checkpoint failed"),
        }
    }

    /// Run a checkpoint around the persistent read
    ///
    /// Refused with `Busy` while a write transaction is open.
    pub fn checkpoint(&mut self, conn: &Connection, mode: CheckpointMode) -> Result<(u64, u64)> {
        match self.state() {
            TxnState::Write => Err(KvError::Busy(
                "cannot checkpoint while a write transaction is open".to_string(),
            )),
            TxnState::Read if self.explicit => Ok(conn.checkpoint(mode)?),
            _ => {
                self.transition(None);
                let result = conn.checkpoint(mode);
                self.open_persistent_read(conn);
                Ok(result?)
            }
        }
    }

    // =========================================================================
    // Cached Cursors
    // =========================================================================

    /// Run `f` with the cached cursor of `table` in the open transaction
    pub fn with_cursor<T>(
        &mut self,
        table: TableId,
        f: impl FnOnce(&Transaction, &mut Cursor) -> Result<T>,
    ) -> Result<T> {
        let txn = self.current.as_ref().ok_or(KvError::NoTransaction)?;
        let cursor = self.cursors.entry(table).or_insert_with(|| Cursor::new(table));
        f(txn, cursor)
    }

    /// Payload stored under `key`, read through the cached cursor
    pub fn read_payload(&mut self, table: TableId, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_cursor(table, |txn, cursor| {
            if !cursor.seek(txn, key)? || cursor.key() != Some(key) {
                return Ok(None);
            }
            Ok(cursor.payload(txn)?.map(|payload| payload.to_vec()))
        })
    }

    pub fn cached_cursors(&self) -> usize {
        self.cursors.len()
    }
}
