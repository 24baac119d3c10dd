//! Pager
//!
//! One pager exists per database file per process. It owns the committed
//! snapshot, the write-ahead log and the single write slot, and is shared
//! by every connection opened on the same path.
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader
//!
//! - **Readers** pin the committed `Arc<Snapshot>` and never block.
//! - **Writers** must hold the write slot. Contenders consult the
//!   connection's busy handler and give up with `Busy` when it declines.
//! - **Commits** log first, then publish by mutating the committed snapshot
//!   (copy-on-write for anything a reader still pins).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::error::{EngineError, EngineResult};
use super::file;
use super::lock::{self, FileLock};
use super::snapshot::Snapshot;
use super::txn::{ReadTxn, Transaction, WriteTxn};
use super::{sidecar_path, TableId};
use crate::config::{CheckpointMode, JournalMode, SyncLevel};
use crate::wal::{WalRecovery, WalWriter};

/// Decides whether to keep waiting for the write slot; receives the retry count
pub type BusyHandler = Arc<dyn Fn(u32) -> bool + Send + Sync>;

/// Settings fixed when the pager is first opened
#[derive(Debug, Clone, Copy)]
pub struct PagerOptions {
    pub journal_mode: JournalMode,
    pub page_size: u32,
    pub read_only: bool,
}

pub struct Pager {
    path: Option<PathBuf>,
    journal_mode: JournalMode,
    page_size: u32,
    writable: bool,
    state: Mutex<PagerState>,
    write_slot: Mutex<bool>,
    _lock: Option<FileLock>,
}

struct PagerState {
    committed: Arc<Snapshot>,
    wal: Option<WalWriter>,
    /// WAL entries already folded into the main file
    backfilled: u64,
    /// Next table id to hand out; rolled-back transactions do not give ids back
    next_table: TableId,
}

/// Exclusive right to write; released on drop
pub struct WriteSlot {
    pager: Arc<Pager>,
}

impl WriteSlot {
    pub(crate) fn allocate_table(&self) -> EngineResult<TableId> {
        self.pager.allocate_table()
    }
}

impl Drop for WriteSlot {
    fn drop(&mut self) {
        *self.pager.write_slot.lock() = false;
    }
}

impl Pager {
    /// Open a database file, or an in-memory database when `path` is `None`
    pub fn open(path: Option<&Path>, options: PagerOptions) -> EngineResult<Self> {
        let path = match path {
            Some(path) => path,
            None => {
                return Ok(Self {
                    path: None,
                    journal_mode: options.journal_mode,
                    page_size: options.page_size,
                    writable: !options.read_only,
                    state: Mutex::new(PagerState {
                        committed: Arc::new(Snapshot::default()),
                        wal: None,
                        backfilled: 0,
                        next_table: 1,
                    }),
                    write_slot: Mutex::new(false),
                    _lock: None,
                });
            }
        };

        let wal_path = sidecar_path(path, "-wal");
        let exists = is_nonempty(path) || is_nonempty(&wal_path);
        if options.read_only && !exists {
            return Err(EngineError::ReadOnly(format!(
                "cannot create database {} in read-only mode",
                path.display()
            )));
        }

        let lock = FileLock::lock(sidecar_path(path, "-lock")).map_err(|e| {
            if lock::is_contended(&e) {
                EngineError::Busy(format!("{} is locked by another process", path.display()))
            } else {
                EngineError::Io(e)
            }
        })?;

        let (mut snapshot, page_size, checkpoint_lsn) = match file::read_snapshot(path)? {
            Some((snapshot, header)) => (snapshot, header.page_size, header.checkpoint_lsn),
            None => (Snapshot::default(), options.page_size, 0),
        };

        let mut last_lsn = checkpoint_lsn;
        let mut frames = 0;
        let mut backfilled = 0;
        if wal_path.exists() {
            let (entries, result) = if options.read_only {
                WalRecovery::scan(&wal_path)?
            } else {
                WalRecovery::recover(&wal_path)?
            };
            if result.entries_recovered > 0 || result.was_truncated {
                info!(
                    path = %wal_path.display(),
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    truncated = result.was_truncated,
                    last_lsn = result.last_lsn,
                    "WAL recovery"
                );
            }
            for entry in &entries {
                if entry.lsn <= checkpoint_lsn {
                    backfilled += 1;
                    continue;
                }
                for op in &entry.operations {
                    snapshot.apply(op)?;
                }
            }
            frames = result.entries_recovered;
            last_lsn = last_lsn.max(result.last_lsn);
        }

        let mut wal = None;
        if !options.read_only {
            match options.journal_mode {
                JournalMode::Wal => {
                    wal = Some(WalWriter::open(&wal_path, last_lsn + 1, frames)?);
                }
                JournalMode::Delete => {
                    if frames > 0 {
                        file::write_snapshot(path, &snapshot, page_size, 0, true)?;
                        debug!(path = %path.display(), frames, "folded WAL into main file");
                    }
                    if wal_path.exists() {
                        fs::remove_file(&wal_path)?;
                    }
                    backfilled = 0;
                }
            }
        }

        debug!(
            path = %path.display(),
            journal = ?options.journal_mode,
            page_size,
            tables = snapshot.tables.len(),
            "opened pager"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            journal_mode: options.journal_mode,
            page_size,
            writable: !options.read_only,
            state: Mutex::new(PagerState {
                next_table: snapshot.next_table,
                committed: Arc::new(snapshot),
                wal,
                backfilled,
            }),
            write_slot: Mutex::new(false),
            _lock: Some(lock),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn journal_mode(&self) -> JournalMode {
        self.journal_mode
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Generation of the newest committed snapshot
    pub fn committed_generation(&self) -> u64 {
        self.state.lock().committed.generation()
    }

    /// Entries currently in the log
    pub fn wal_frames(&self) -> u64 {
        self.state.lock().wal.as_ref().map_or(0, |wal| wal.entry_count())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub fn begin_read(&self) -> Transaction {
        let snapshot = Arc::clone(&self.state.lock().committed);
        Transaction::Read(ReadTxn::new(snapshot))
    }

    pub fn begin_write(self: &Arc<Self>, busy: Option<&BusyHandler>) -> EngineResult<Transaction> {
        if !self.writable {
            return Err(EngineError::ReadOnly("database opened read-only".to_string()));
        }
        let slot = self.acquire_write_slot(busy)?;
        let base = Arc::clone(&self.state.lock().committed);
        Ok(Transaction::Write(WriteTxn::new(base, slot)))
    }

    fn acquire_write_slot(self: &Arc<Self>, busy: Option<&BusyHandler>) -> EngineResult<WriteSlot> {
        let mut attempt = 0u32;
        loop {
            {
                let mut held = self.write_slot.lock();
                if !*held {
                    *held = true;
                    return Ok(WriteSlot { pager: Arc::clone(self) });
                }
            }
            match busy {
                Some(handler) if handler(attempt) => attempt += 1,
                _ => {
                    return Err(EngineError::Busy(
                        "another connection holds the write lock".to_string(),
                    ))
                }
            }
        }
    }

    /// Table id unused by any transaction of this pager, committed or not
    fn allocate_table(&self) -> EngineResult<TableId> {
        let mut state = self.state.lock();
        let table = state.next_table.max(state.committed.next_table);
        state.next_table = table
            .checked_add(1)
            .ok_or_else(|| EngineError::Misuse("table ids exhausted".to_string()))?;
        Ok(table)
    }

    /// Make a write transaction durable and visible
    pub fn commit(&self, txn: WriteTxn, sync: SyncLevel) -> EngineResult<()> {
        let (ops, _slot) = txn.into_operations();
        if ops.is_empty() {
            return Ok(());
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(wal) = state.wal.as_mut() {
            // Fully checkpointed log: start over instead of growing forever
            if wal.entry_count() > 0 && state.backfilled >= wal.entry_count() {
                wal.truncate()?;
                state.backfilled = 0;
            }
            wal.append(&ops)?;
            if sync == SyncLevel::Full {
                wal.sync()?;
            }
        }

        let snapshot = Arc::make_mut(&mut state.committed);
        for op in &ops {
            snapshot.apply(op).map_err(|e| {
                EngineError::Corrupt(format!("failed to apply committed operation: {}", e))
            })?;
        }
        snapshot.generation += 1;

        if let (Some(path), JournalMode::Delete) = (&self.path, self.journal_mode) {
            if let Err(e) = file::write_snapshot(path, snapshot, self.page_size, 0, sync != SyncLevel::Off) {
                warn!(path = %path.display(), error = %e, "failed to rewrite database file");
                return Err(e);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Copy the log into the main file; returns `(log frames, checkpointed frames)`
    pub fn checkpoint(
        self: &Arc<Self>,
        mode: CheckpointMode,
        sync: SyncLevel,
        busy: Option<&BusyHandler>,
    ) -> EngineResult<(u64, u64)> {
        let path = match (&self.path, self.journal_mode) {
            (Some(path), JournalMode::Wal) if self.writable => path,
            _ => return Ok((0, 0)),
        };

        let _slot = match mode {
            CheckpointMode::Passive => None,
            _ => Some(self.acquire_write_slot(busy)?),
        };

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let wal = match state.wal.as_mut() {
            Some(wal) => wal,
            None => return Ok((0, 0)),
        };

        let frames = wal.entry_count();
        if frames > state.backfilled {
            file::write_snapshot(
                path,
                &state.committed,
                self.page_size,
                wal.last_lsn(),
                sync != SyncLevel::Off,
            )?;
            state.backfilled = frames;
        }

        let result = match mode {
            CheckpointMode::Passive | CheckpointMode::Full => (frames, frames),
            CheckpointMode::Restart => {
                wal.truncate()?;
                state.backfilled = 0;
                (frames, frames)
            }
            CheckpointMode::Truncate => {
                wal.truncate()?;
                state.backfilled = 0;
                (0, 0)
            }
        };
        debug!(?mode, frames, "checkpoint");
        Ok(result)
    }

    /// Flush everything committed so far to stable storage
    pub fn sync(&self) -> EngineResult<()> {
        let mut state = self.state.lock();
        if let Some(wal) = state.wal.as_mut() {
            return wal.sync();
        }
        match (&self.path, self.journal_mode) {
            (Some(path), JournalMode::Delete) => file::sync_file(path),
            _ => Ok(()),
        }
    }

    /// Rewrite the main file from the committed snapshot and empty the log
    pub fn vacuum(&self, sync: SyncLevel) -> EngineResult<u64> {
        let path = match &self.path {
            Some(path) if self.writable => path,
            _ => return Ok(0),
        };
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let checkpoint_lsn = state.wal.as_ref().map_or(0, |wal| wal.last_lsn());
        let written = file::write_snapshot(
            path,
            &state.committed,
            self.page_size,
            checkpoint_lsn,
            sync != SyncLevel::Off,
        )?;
        if let Some(wal) = state.wal.as_mut() {
            wal.truncate()?;
        }
        state.backfilled = 0;
        debug!(path = %path.display(), bytes = written, "vacuumed database file");
        Ok(written)
    }

    /// Cross-check live tables against the tables the caller can reach
    ///
    /// Returns one message per problem; empty means consistent.
    pub fn integrity_check(txn: &Transaction, roots: &[TableId]) -> Vec<String> {
        let mut problems = Vec::new();
        for root in roots {
            if !txn.has_table(*root) {
                problems.push(format!("table {} is referenced but does not exist", root));
            }
        }
        for table in txn.table_ids() {
            if !roots.contains(&table) {
                problems.push(format!("table {} is never used", table));
            }
        }
        problems
    }
}

fn is_nonempty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}
