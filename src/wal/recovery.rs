//! WAL Recovery
//!
//! Reads back the log after a restart or crash.

use std::fs::OpenOptions;
use std::path::Path;

use super::reader::{Frame, WalReader};
use super::WalEntry;
use crate::storage::EngineResult;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of complete entries that failed verification
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether a bad tail was found (and, for `recover`, cut off)
    pub was_truncated: bool,

    /// Length of the verified prefix in bytes
    pub valid_len: u64,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read entries in order until the first bad frame
    /// 2. Treat an out-of-order LSN as the end of valid data
    /// 3. Truncate the file to the verified prefix
    pub fn recover(path: &Path) -> EngineResult<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result) = Self::scan(path)?;
        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_len)?;
            file.sync_all()?;
        }
        Ok((entries, result))
    }

    /// Read the valid entries without modifying the file
    pub fn scan(path: &Path) -> EngineResult<(Vec<WalEntry>, RecoveryResult)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_frame()? {
                Frame::Entry(entry) => {
                    if entry.lsn <= result.last_lsn {
                        result.entries_corrupted += 1;
                        result.was_truncated = true;
                        break;
                    }
                    result.last_lsn = entry.lsn;
                    result.entries_recovered += 1;
                    result.valid_len = reader.valid_len();
                    entries.push(entry);
                }
                Frame::End => break,
                Frame::TornTail => {
                    result.was_truncated = true;
                    break;
                }
                Frame::Corrupt => {
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break;
                }
            }
        }
        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> EngineResult<RecoveryResult> {
        Self::scan(path).map(|(_, result)| result)
    }
}
