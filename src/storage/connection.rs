//! Engine connection
//!
//! Per-store view of a shared pager: carries the settings that may differ
//! between connections to one file (sync level, read-only, busy handling).

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::error::{EngineError, EngineResult};
use super::pager::{BusyHandler, Pager, PagerOptions};
use super::registry;
use super::txn::Transaction;
use super::TableId;
use crate::config::{CheckpointMode, Config, SyncLevel};

pub struct Connection {
    pager: Arc<Pager>,
    read_only: bool,
    sync_level: SyncLevel,
    cache_size: u32,
    busy: Option<BusyHandler>,
}

impl Connection {
    pub fn open(path: Option<&Path>, config: &Config) -> EngineResult<Self> {
        let pager = registry::open_pager(
            path,
            PagerOptions {
                journal_mode: config.journal_mode,
                page_size: config.page_size,
                read_only: config.read_only,
            },
        )?;
        let busy = (config.busy_timeout_ms > 0).then(|| timeout_busy_handler(config.busy_timeout_ms));
        Ok(Self {
            pager,
            read_only: config.read_only,
            sync_level: config.sync_level,
            cache_size: config.cache_size,
            busy,
        })
    }

    pub fn pager(&self) -> &Arc<Pager> {
        &self.pager
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_memory(&self) -> bool {
        self.pager.path().is_none()
    }

    pub fn cache_size(&self) -> u32 {
        self.cache_size
    }

    pub fn page_size(&self) -> u32 {
        self.pager.page_size()
    }

    /// Replace the busy handler (`None` fails immediately on contention)
    pub fn set_busy_handler(&mut self, handler: Option<BusyHandler>) {
        self.busy = handler;
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub fn begin_read(&self) -> Transaction {
        self.pager.begin_read()
    }

    pub fn begin_write(&self) -> EngineResult<Transaction> {
        if self.read_only {
            return Err(EngineError::ReadOnly("connection is read-only".to_string()));
        }
        self.pager.begin_write(self.busy.as_ref())
    }

    pub fn commit(&self, txn: Transaction) -> EngineResult<()> {
        match txn {
            Transaction::Read(_) => Ok(()),
            Transaction::Write(txn) => self.pager.commit(txn, self.sync_level),
        }
    }

    /// Discard a transaction; dropping the overlay releases the write slot
    pub fn rollback(&self, txn: Transaction) {
        drop(txn);
    }

    /// Whether another connection committed since `txn` began
    pub fn is_stale(&self, txn: &Transaction) -> bool {
        self.pager.committed_generation() != txn.generation()
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    pub fn checkpoint(&self, mode: CheckpointMode) -> EngineResult<(u64, u64)> {
        if self.read_only {
            return Ok((0, 0));
        }
        self.pager.checkpoint(mode, self.sync_level, self.busy.as_ref())
    }

    pub fn sync(&self) -> EngineResult<()> {
        if self.read_only {
            return Ok(());
        }
        self.pager.sync()
    }

    pub fn vacuum(&self) -> EngineResult<u64> {
        if self.read_only {
            return Err(EngineError::ReadOnly("connection is read-only".to_string()));
        }
        self.pager.vacuum(self.sync_level)
    }

    pub fn integrity_check(&self, txn: &Transaction, roots: &[TableId]) -> Vec<String> {
        Pager::integrity_check(txn, roots)
    }
}

/// Busy handler that sleeps with growing delays until `timeout_ms` is spent
pub fn timeout_busy_handler(timeout_ms: u64) -> BusyHandler {
    const DELAYS: [u64; 12] = [1, 2, 5, 10, 15, 20, 25, 25, 25, 50, 50, 100];

    Arc::new(move |attempt: u32| {
        let attempt = attempt as usize;
        let (delay, prior) = if attempt < DELAYS.len() {
            (DELAYS[attempt], DELAYS[..attempt].iter().sum::<u64>())
        } else {
            let last = DELAYS[DELAYS.len() - 1];
            let total: u64 = DELAYS.iter().sum();
            (last, total + last * (attempt - DELAYS.len()) as u64)
        };
        if prior >= timeout_ms {
            return false;
        }
        thread::sleep(Duration::from_millis(delay.min(timeout_ms - prior)));
        true
    })
}
