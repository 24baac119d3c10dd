//! Main database file
//!
//! Holds a complete committed snapshot. It is rewritten whole, through a
//! temporary sibling and an atomic rename, at every checkpoint (WAL journal)
//! or every commit (delete journal).
//!
//! ## Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (32 bytes, little endian)                             │
//! │ ┌──────────┬──────────┬──────────┬──────────┬──────────────┐ │
//! │ │Magic (4) │Version(2)│Flags (2) │PageSz (4)│ Ckpt LSN (8) │ │
//! │ └──────────┴──────────┴──────────┴──────────┴──────────────┘ │
//! │ ┌──────────────────┬─────────────────┐                       │
//! │ │ Body Len (8)     │   CRC32 (4)     │                       │
//! │ └──────────────────┴─────────────────┘                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Body: bincode(Snapshot)                                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use bytes::{Buf, BufMut};

use super::error::{EngineError, EngineResult};
use super::snapshot::Snapshot;
use super::sidecar_path;

pub const MAGIC: &[u8; 4] = b"KVLT";
pub const VERSION: u16 = 1;
pub const HEADER_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub page_size: u32,
    /// Newest WAL entry already folded into this file
    pub checkpoint_lsn: u64,
    pub body_len: u64,
    pub crc: u32,
}

impl FileHeader {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.put_slice(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u16_le(0);
        buf.put_u32_le(self.page_size);
        buf.put_u64_le(self.checkpoint_lsn);
        buf.put_u64_le(self.body_len);
        buf.put_u32_le(self.crc);
        buf
    }

    fn decode(mut raw: &[u8]) -> EngineResult<Self> {
        if &raw[..4] != MAGIC {
            return Err(EngineError::Corrupt(format!(
                "invalid database magic: expected KVLT, got {:?}",
                &raw[..4]
            )));
        }
        raw.advance(4);
        let version = raw.get_u16_le();
        if version != VERSION {
            return Err(EngineError::Corrupt(format!(
                "unsupported database file version: {}",
                version
            )));
        }
        let _flags = raw.get_u16_le();
        Ok(Self {
            page_size: raw.get_u32_le(),
            checkpoint_lsn: raw.get_u64_le(),
            body_len: raw.get_u64_le(),
            crc: raw.get_u32_le(),
        })
    }
}

/// Atomically replace the main file with `snapshot`; returns bytes written
pub fn write_snapshot(
    path: &Path,
    snapshot: &Snapshot,
    page_size: u32,
    checkpoint_lsn: u64,
    durable: bool,
) -> EngineResult<u64> {
    let body = bincode::serialize(snapshot)?;
    let header = FileHeader {
        page_size,
        checkpoint_lsn,
        body_len: body.len() as u64,
        crc: crc32fast::hash(&body),
    };

    let tmp_path = sidecar_path(path, "-tmp");
    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&header.encode())?;
        file.write_all(&body)?;
        if durable {
            file.sync_all()?;
        }
    }
    fs::rename(&tmp_path, path)?;
    if durable {
        sync_parent_dir(path)?;
    }
    Ok((HEADER_SIZE + body.len()) as u64)
}

/// Load the main file; `None` when it does not exist or is empty
pub fn read_snapshot(path: &Path) -> EngineResult<Option<(Snapshot, FileHeader)>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let file_len = file.metadata()?.len();
    if file_len == 0 {
        return Ok(None);
    }
    if file_len < HEADER_SIZE as u64 {
        return Err(EngineError::Corrupt(format!(
            "database file of {} bytes is shorter than its header",
            file_len
        )));
    }

    let mut raw = [0u8; HEADER_SIZE];
    file.read_exact(&mut raw)?;
    let header = FileHeader::decode(&raw)?;

    if header.body_len != file_len - HEADER_SIZE as u64 {
        return Err(EngineError::Corrupt(format!(
            "database body is {} bytes, header declares {}",
            file_len - HEADER_SIZE as u64,
            header.body_len
        )));
    }
    let mut body = Vec::new();
    body.try_reserve_exact(header.body_len as usize).map_err(|_| EngineError::NoMem)?;
    file.read_to_end(&mut body)?;
    if crc32fast::hash(&body) != header.crc {
        return Err(EngineError::Corrupt("database body checksum mismatch".to_string()));
    }

    let snapshot: Snapshot = bincode::deserialize(&body)?;
    Ok(Some((snapshot, header)))
}

/// fsync an existing main file in place
pub fn sync_file(path: &Path) -> EngineResult<()> {
    match File::open(path) {
        Ok(file) => Ok(file.sync_all()?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> EngineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> EngineResult<()> {
    Ok(())
}
