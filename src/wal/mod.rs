//! Write-Ahead Log (WAL) Module
//!
//! Provides durability for committed write transactions.
//!
//! ## Responsibilities
//! - Append one entry per committed write transaction
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering, monotonic across restarts
//! - Torn-tail detection and truncation on recovery
//!
//! ## Frame Layout
//! ```text
//!   0        8        12       16                16 + len
//!   ┌────────┬────────┬────────┬──────────────────┐
//!   │ LSN    │ CRC32  │ len    │ bincode body     │   (little endian)
//!   └────────┴────────┴────────┴──────────────────┘
//! ```
//!
//! The body holds the transaction's operations and its commit timestamp;
//! the CRC covers the body only. Frames follow each other with no
//! file header, so an empty file is an empty log.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{WalEntry, Operation, HEADER_SIZE};
pub use writer::WalWriter;
pub use reader::{Frame, WalReader};
pub use recovery::{WalRecovery, RecoveryResult};
