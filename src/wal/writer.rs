//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::entry::{encode_frame, now_millis};
use super::Operation;
use crate::storage::EngineResult;

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    /// LSN the next append receives
    next_lsn: u64,
    /// Entries currently in the file
    entry_count: u64,
    /// Entries appended since the last sync
    uncommitted: u64,
}

impl WalWriter {
    /// Open or create a WAL file for appending
    ///
    /// The caller supplies what recovery found: the first LSN to hand out and
    /// the number of valid entries already in the file.
    pub fn open(path: &Path, next_lsn: u64, entry_count: u64) -> EngineResult<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_lsn: next_lsn.max(1),
            entry_count,
            uncommitted: 0,
        })
    }

    /// Append one transaction; returns its LSN
    pub fn append(&mut self, operations: &[Operation]) -> EngineResult<u64> {
        let lsn = self.next_lsn;
        let frame = encode_frame(lsn, now_millis(), operations)?;
        self.file.write_all(&frame)?;

        self.next_lsn += 1;
        self.entry_count += 1;
        self.uncommitted += 1;
        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> EngineResult<()> {
        self.file.sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Drop every entry
    ///
    /// LSNs keep counting up so entries written afterwards still sort after
    /// anything already checkpointed.
    pub fn truncate(&mut self) -> EngineResult<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?;
        self.entry_count = 0;
        self.uncommitted = 0;
        Ok(())
    }

    /// LSN the next append receives
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// LSN of the newest entry ever appended (0 if none)
    pub fn last_lsn(&self) -> u64 {
        self.next_lsn - 1
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn uncommitted_count(&self) -> u64 {
        self.uncommitted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
