//! Storage Module
//!
//! The ordered storage engine underneath the store: transactional tables,
//! cursors, metadata slots, a write-ahead log and checkpoints.
//!
//! ## Responsibilities
//! - Tables addressable by a `TableId`, created and dropped transactionally
//! - Cursors supporting seek, first, next, payload reads, insert, delete
//! - Read transactions over pinned snapshots, one writer at a time
//! - A small fixed set of persisted metadata slots
//! - WAL checkpoints (passive / full / restart / truncate)
//!
//! ## Files
//! ```text
//! <db>        main file: header + full committed snapshot
//! <db>-wal    write-ahead log (WAL journal mode only)
//! <db>-lock   advisory lock held by the owning process
//! ```

mod connection;
mod cursor;
mod error;
mod file;
mod lock;
mod pager;
mod registry;
mod snapshot;
mod table;
mod txn;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub use connection::{timeout_busy_handler, Connection};
pub use cursor::Cursor;
pub use error::{EngineError, EngineResult};
pub use file::{FileHeader, HEADER_SIZE as FILE_HEADER_SIZE, MAGIC as FILE_MAGIC};
pub use pager::{BusyHandler, Pager, PagerOptions, WriteSlot};
pub use registry::{open_pager, open_pager_count};
pub use snapshot::Snapshot;
pub use table::Table;
pub use txn::{ReadTxn, Transaction, WriteTxn};

/// Opaque table handle
pub type TableId = u32;

/// Number of persisted metadata slots
pub const META_SLOTS: usize = 16;

/// Meta slot holding the default column family's table
pub const META_DEFAULT_CF_TABLE: usize = 1;

/// Meta slot holding the live column family count
pub const META_CF_COUNT: usize = 2;

/// Meta slot holding the column family registry table
pub const META_REGISTRY_TABLE: usize = 3;

/// `<path><suffix>`, e.g. `data.db` + `-wal`
pub(crate) fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
