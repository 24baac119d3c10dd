//! Table cursors
//!
//! A cursor remembers only its table and the key it is positioned on. Every
//! movement re-seeks through the transaction passed in, so a cursor stays
//! valid across writes made by the same transaction and never pins pages.

use std::ops::Bound;

use super::error::EngineResult;
use super::txn::Transaction;
use super::TableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Before the first row
    Unpositioned,
    OnRow,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Cursor {
    table: TableId,
    key: Vec<u8>,
    position: Position,
}

impl Cursor {
    pub fn new(table: TableId) -> Self {
        Self {
            table,
            key: Vec::new(),
            position: Position::Unpositioned,
        }
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    /// Move to the first row; returns whether one exists
    pub fn first(&mut self, txn: &Transaction) -> EngineResult<bool> {
        self.move_to(txn, Bound::Unbounded)
    }

    /// Move to the first row whose key is `>= key`
    pub fn seek(&mut self, txn: &Transaction, key: &[u8]) -> EngineResult<bool> {
        self.move_to(txn, Bound::Included(key))
    }

    /// Advance past the current row
    ///
    /// An unpositioned cursor moves to the first row; a cursor at the end
    /// stays there.
    pub fn next(&mut self, txn: &Transaction) -> EngineResult<bool> {
        match self.position {
            Position::Eof => Ok(false),
            Position::Unpositioned => self.first(txn),
            Position::OnRow => {
                let current = std::mem::take(&mut self.key);
                self.move_to(txn, Bound::Excluded(&current))
            }
        }
    }

    fn move_to(&mut self, txn: &Transaction, from: Bound<&[u8]>) -> EngineResult<bool> {
        match txn.seek(self.table, from)? {
            Some((key, _)) => {
                self.key.clear();
                self.key.extend_from_slice(key);
                self.position = Position::OnRow;
                Ok(true)
            }
            None => {
                self.key.clear();
                self.position = Position::Eof;
                Ok(false)
            }
        }
    }

    pub fn is_eof(&self) -> bool {
        self.position == Position::Eof
    }

    pub fn is_valid(&self) -> bool {
        self.position == Position::OnRow
    }

    /// Sort key of the current row
    pub fn key(&self) -> Option<&[u8]> {
        self.is_valid().then_some(self.key.as_slice())
    }

    /// Payload of the current row, `None` if it has since been deleted
    pub fn payload<'t>(&self, txn: &'t Transaction) -> EngineResult<Option<&'t [u8]>> {
        if !self.is_valid() {
            return Ok(None);
        }
        txn.get(self.table, &self.key)
    }

    /// Copy `buf.len()` payload bytes starting at `offset`; returns bytes copied
    pub fn read_payload(&self, txn: &Transaction, offset: usize, buf: &mut [u8]) -> EngineResult<usize> {
        let payload = match self.payload(txn)? {
            Some(payload) => payload,
            None => return Ok(0),
        };
        if offset >= payload.len() {
            return Ok(0);
        }
        let n = buf.len().min(payload.len() - offset);
        buf[..n].copy_from_slice(&payload[offset..offset + n]);
        Ok(n)
    }

    /// Insert or overwrite a row and position on it
    pub fn insert(&mut self, txn: &mut Transaction, key: &[u8], payload: &[u8]) -> EngineResult<()> {
        txn.insert(self.table, key, payload)?;
        self.key.clear();
        self.key.extend_from_slice(key);
        self.position = Position::OnRow;
        Ok(())
    }

    /// Delete the current row
    ///
    /// The cursor keeps its key, so `next` continues with the following row.
    pub fn delete(&mut self, txn: &mut Transaction) -> EngineResult<()> {
        if !self.is_valid() {
            return Ok(());
        }
        txn.delete(self.table, &self.key)
    }

    /// Forget the position (the cursor stays bound to its table)
    pub fn reset(&mut self) {
        self.key.clear();
        self.position = Position::Unpositioned;
    }
}
