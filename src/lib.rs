//! # kvlite
//!
//! An embedded key-value store with:
//! - Multiple column families, each its own ordered key space
//! - Per-key TTL with lazy expiry and batch purge
//! - Ordered and prefix iteration
//! - Explicit and implicit transactions over a single-writer engine
//! - Write-ahead logging with checkpoints, or rewrite-on-commit journaling
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Store  /  ColumnFamily  /  KvIterator            │
//! │                  (reference-counted handles)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!       ┌───────────────┼──────────────────┬──────────────┐
//!       ▼               ▼                  ▼              ▼
//! ┌───────────┐  ┌─────────────┐   ┌─────────────┐  ┌──────────┐
//! │ CF        │  │ Transaction │   │ TTL         │  │ Record   │
//! │ Registry  │  │ Controller  │   │ Indexes     │  │ Codec    │
//! └─────┬─────┘  └──────┬──────┘   └──────┬──────┘  └──────────┘
//!       └───────────────┼─────────────────┘
//!                       ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Storage Engine                         │
//! │   tables · cursors · snapshots · meta slots · checkpoints   │
//! └─────────────┬───────────────────────────────┬───────────────┘
//!               ▼                               ▼
//!        ┌─────────────┐                 ┌─────────────┐
//!        │  Main file  │                 │     WAL     │
//!        └─────────────┘                 └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use kvlite::{Config, Store};
//!
//! let store = Store::open("data.kv", Config::default())?;
//! store.put(b"apple", b"red")?;
//! assert_eq!(store.get(b"apple")?, b"red");
//!
//! let sessions = store.cf_create("sessions")?;
//! sessions.put_with_ttl(b"token", b"abc", kvlite::now_ms() + 60_000)?;
//! # Ok::<(), kvlite::KvError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod wal;
pub mod storage;

pub mod cf;
pub mod iterator;
pub mod stats;
pub mod store;
pub mod ttl;
pub mod txn;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorCode, KvError, Result};
pub use config::{CheckpointMode, Config, ConfigBuilder, JournalMode, SyncLevel};
pub use cf::ColumnFamily;
pub use iterator::KvIterator;
pub use stats::Stats;
pub use store::{Store, MAX_KEY_LEN, MAX_VALUE_LEN};
pub use ttl::{now_ms, NO_TTL};
pub use txn::TxnState;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvlite
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
