//! Error types for kvlite
//!
//! Provides a unified error type for all store operations, plus the closed
//! set of result codes every error collapses to.

use std::fmt;

use thiserror::Error;

use crate::storage::EngineError;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Closed set of result codes reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    Error,
    /// Locked by another connection
    Busy,
    /// Locked within the same connection
    Locked,
    NoMem,
    ReadOnly,
    Corrupt,
    NotFound,
    Protocol,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Ok => "ok",
            ErrorCode::Error => "error",
            ErrorCode::Busy => "busy",
            ErrorCode::Locked => "locked",
            ErrorCode::NoMem => "out of memory",
            ErrorCode::ReadOnly => "read-only",
            ErrorCode::Corrupt => "corrupt",
            ErrorCode::NotFound => "not found",
            ErrorCode::Protocol => "protocol error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for kvlite operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // Validation Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Transaction already active")]
    TransactionActive,

    #[error("No active transaction")]
    NoTransaction,

    #[error("Table full: {0}")]
    Full(String),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Not found")]
    NotFound,

    // -------------------------------------------------------------------------
    // Contention Errors
    // -------------------------------------------------------------------------
    #[error("Database is busy: {0}")]
    Busy(String),

    #[error("Database is locked: {0}")]
    Locked(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Attempt to write a read-only database: {0}")]
    ReadOnly(String),

    #[error("Database corruption: {0}")]
    Corrupt(String),

    #[error("Out of memory")]
    NoMem,

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl KvError {
    /// The result code this error reports to callers
    pub fn code(&self) -> ErrorCode {
        match self {
            KvError::InvalidArgument(_)
            | KvError::AlreadyExists(_)
            | KvError::TransactionActive
            | KvError::NoTransaction
            | KvError::Full(_)
            | KvError::Io(_)
            | KvError::Serialization(_) => ErrorCode::Error,
            KvError::NotFound => ErrorCode::NotFound,
            KvError::Busy(_) => ErrorCode::Busy,
            KvError::Locked(_) => ErrorCode::Locked,
            KvError::ReadOnly(_) => ErrorCode::ReadOnly,
            KvError::Corrupt(_) => ErrorCode::Corrupt,
            KvError::NoMem => ErrorCode::NoMem,
            KvError::Protocol(_) => ErrorCode::Protocol,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::NotFound)
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, KvError::Corrupt(_))
    }
}

impl From<EngineError> for KvError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Busy(msg) => KvError::Busy(msg),
            EngineError::Locked(msg) => KvError::Locked(msg),
            EngineError::ReadOnly(msg) => KvError::ReadOnly(msg),
            EngineError::Corrupt(msg) => KvError::Corrupt(msg),
            EngineError::NoSuchTable(table) => {
                KvError::Protocol(format!("table {} no longer exists", table))
            }
            EngineError::NoWriteTransaction => {
                KvError::ReadOnly("write attempted inside a read transaction".to_string())
            }
            EngineError::NoMem => KvError::NoMem,
            EngineError::Misuse(msg) => KvError::Protocol(msg),
            EngineError::Io(e) => KvError::Io(e),
            EngineError::Serialization(msg) => KvError::Serialization(msg),
        }
    }
}
