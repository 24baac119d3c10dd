//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use bytes::Buf;

use super::{WalEntry, HEADER_SIZE};
use crate::storage::{EngineError, EngineResult};

/// Outcome of reading one frame
#[derive(Debug)]
pub enum Frame {
    Entry(WalEntry),

    /// Clean end of file
    End,

    /// The file ends inside a frame (partial write)
    TornTail,

    /// A complete frame whose checksum or body does not verify
    Corrupt,
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    file_len: u64,
    /// Offset just past the last good frame
    valid_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> EngineResult<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self { reader: BufReader::new(file), file_len, valid_len: 0 })
    }

    /// Read the next frame
    pub fn next_frame(&mut self) -> EngineResult<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        match read_full(&mut self.reader, &mut header)? {
            0 => return Ok(Frame::End),
            n if n < HEADER_SIZE => return Ok(Frame::TornTail),
            _ => {}
        }

        let len = (&header[12..16]).get_u32_le() as usize;
        let remaining = self.file_len.saturating_sub(self.valid_len + HEADER_SIZE as u64);
        if len as u64 > remaining {
            return Ok(Frame::TornTail);
        }
        let mut frame = Vec::with_capacity(HEADER_SIZE + len);
        frame.extend_from_slice(&header);
        frame.resize(HEADER_SIZE + len, 0);
        if read_full(&mut self.reader, &mut frame[HEADER_SIZE..])? < len {
            return Ok(Frame::TornTail);
        }

        match WalEntry::deserialize(&frame) {
            Ok(entry) => {
                self.valid_len += frame.len() as u64;
                Ok(Frame::Entry(entry))
            }
            Err(EngineError::Corrupt(_)) | Err(EngineError::Serialization(_)) => Ok(Frame::Corrupt),
            Err(e) => Err(e),
        }
    }

    /// Read the next valid entry; corruption ends the stream
    pub fn next_entry(&mut self) -> EngineResult<Option<WalEntry>> {
        match self.next_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::End => Ok(None),
            Frame::TornTail => Err(EngineError::Corrupt("WAL ends inside a frame".to_string())),
            Frame::Corrupt => Err(EngineError::Corrupt("WAL frame failed verification".to_string())),
        }
    }

    /// Byte length of the verified prefix read so far
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }
}

/// Fill `buf` as far as the file allows; returns bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> EngineResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
