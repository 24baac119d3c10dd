//! Engine error type
//!
//! The storage engine reports its own outcomes; the store translates them
//! into [`crate::KvError`] at a single conversion point.

use thiserror::Error;

use super::TableId;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    // -------------------------------------------------------------------------
    // Contention
    // -------------------------------------------------------------------------
    #[error("database is busy: {0}")]
    Busy(String),

    #[error("database table is locked: {0}")]
    Locked(String),

    // -------------------------------------------------------------------------
    // Access
    // -------------------------------------------------------------------------
    #[error("read-only: {0}")]
    ReadOnly(String),

    #[error("cannot write inside a read transaction")]
    NoWriteTransaction,

    #[error("misuse: {0}")]
    Misuse(String),

    // -------------------------------------------------------------------------
    // Data
    // -------------------------------------------------------------------------
    #[error("corrupt: {0}")]
    Corrupt(String),

    #[error("no such table: {0}")]
    NoSuchTable(TableId),

    #[error("out of memory")]
    NoMem,

    // -------------------------------------------------------------------------
    // I/O
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for EngineError {
    fn from(err: bincode::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
