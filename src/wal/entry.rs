//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::storage::{EngineError, EngineResult, TableId};

/// Bytes before the entry body: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL: one committed write transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operations of the transaction, in apply order
    pub operations: Vec<Operation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create an empty table
    CreateTable { table: TableId },

    /// Remove a table and all of its rows
    DropTable { table: TableId },

    /// Insert or overwrite a row
    Put { table: TableId, key: Vec<u8>, payload: Vec<u8> },

    /// Delete a row
    Delete { table: TableId, key: Vec<u8> },

    /// Update a metadata slot
    SetMeta { slot: usize, value: u32 },
}

#[derive(Serialize)]
struct BodyRef<'a> {
    timestamp: u64,
    operations: &'a [Operation],
}

#[derive(Deserialize)]
struct Body {
    timestamp: u64,
    operations: Vec<Operation>,
}

impl WalEntry {
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        Self { lsn, operations, timestamp: now_millis() }
    }

    /// Serialize to a complete frame (header + body)
    pub fn serialize(&self) -> EngineResult<Vec<u8>> {
        encode_frame(self.lsn, self.timestamp, &self.operations)
    }

    /// Parse a complete frame, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> EngineResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(EngineError::Corrupt(format!(
                "WAL frame of {} bytes is shorter than its header",
                bytes.len()
            )));
        }
        let mut header = &bytes[..HEADER_SIZE];
        let lsn = header.get_u64_le();
        let crc = header.get_u32_le();
        let len = header.get_u32_le() as usize;

        let body = &bytes[HEADER_SIZE..];
        if body.len() != len {
            return Err(EngineError::Corrupt(format!(
                "WAL frame {} declares {} body bytes, found {}",
                lsn,
                len,
                body.len()
            )));
        }
        if crc32fast::hash(body) != crc {
            return Err(EngineError::Corrupt(format!("WAL frame {} checksum mismatch", lsn)));
        }

        let body: Body = bincode::deserialize(body)?;
        Ok(Self { lsn, operations: body.operations, timestamp: body.timestamp })
    }

    pub fn compute_crc(&self) -> EngineResult<u32> {
        let body = bincode::serialize(&BodyRef {
            timestamp: self.timestamp,
            operations: &self.operations,
        })?;
        Ok(crc32fast::hash(&body))
    }
}

/// Build a frame without taking ownership of the operations
pub(crate) fn encode_frame(lsn: u64, timestamp: u64, operations: &[Operation]) -> EngineResult<Vec<u8>> {
    let body = bincode::serialize(&BodyRef { timestamp, operations })?;
    let len = u32::try_from(body.len())
        .map_err(|_| EngineError::Misuse(format!("WAL frame of {} bytes", body.len())))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    frame.put_u64_le(lsn);
    frame.put_u32_le(crc32fast::hash(&body));
    frame.put_u32_le(len);
    frame.put_slice(&body);
    Ok(frame)
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
