//! Configuration for kvlite
//!
//! Centralized configuration with sensible defaults. Every field has a
//! default, so `Config::default()` opens a WAL-journaled store with
//! `Normal` sync and no auto-checkpoint.

use crate::error::{KvError, Result};

/// Default page cache budget, in pages
pub const DEFAULT_CACHE_SIZE: u32 = 2000;

/// Default page size for newly created databases
pub const DEFAULT_PAGE_SIZE: u32 = 4096;

pub const MIN_PAGE_SIZE: u32 = 512;
pub const MAX_PAGE_SIZE: u32 = 65536;

/// Main configuration for a kvlite store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Journal Configuration
    // -------------------------------------------------------------------------
    /// How commits reach the main database file
    pub journal_mode: JournalMode,

    /// How often the engine fsyncs
    pub sync_level: SyncLevel,

    /// Auto-checkpoint after this many committed write transactions (0 = off)
    pub wal_size_limit: u32,

    // -------------------------------------------------------------------------
    // Page Configuration
    // -------------------------------------------------------------------------
    /// Page cache budget in pages (0 = default)
    pub cache_size: u32,

    /// Page size in bytes; only applied when the database is created
    pub page_size: u32,

    // -------------------------------------------------------------------------
    // Access Configuration
    // -------------------------------------------------------------------------
    /// Refuse every write and refuse to create a new database
    pub read_only: bool,

    /// How long to retry when another connection holds the write slot
    /// (milliseconds, 0 = fail immediately with `Busy`)
    pub busy_timeout_ms: u64,
}

/// Journal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Rewrite the main file on every commit (no log file)
    Delete,

    /// Append commits to `<db>-wal`; readers never block the writer
    Wal,
}

/// Durability level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncLevel {
    /// Never fsync (fastest, not crash safe)
    Off,

    /// fsync at checkpoints (WAL commits survive process crashes)
    Normal,

    /// fsync on every commit (safest, slowest)
    Full,
}

/// WAL checkpoint mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointMode {
    /// Copy frames into the main file without blocking
    Passive,

    /// Copy all frames, waiting for the writer
    Full,

    /// Like Full, then restart the log from the beginning
    Restart,

    /// Like Restart, then truncate the log file to zero bytes
    Truncate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::Wal,
            sync_level: SyncLevel::Normal,
            wal_size_limit: 0,
            cache_size: DEFAULT_CACHE_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            read_only: false,
            busy_timeout_ms: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Replace zero values with their defaults and reject invalid ones
    pub(crate) fn normalized(mut self) -> Result<Self> {
        if self.cache_size == 0 {
            self.cache_size = DEFAULT_CACHE_SIZE;
        }
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if !self.page_size.is_power_of_two()
            || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size)
        {
            return Err(KvError::InvalidArgument(format!(
                "page size {} must be a power of two between {} and {}",
                self.page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }
        Ok(self)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the journal mode
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.config.journal_mode = mode;
        self
    }

    /// Set the sync level
    pub fn sync_level(mut self, level: SyncLevel) -> Self {
        self.config.sync_level = level;
        self
    }

    /// Set the auto-checkpoint threshold (committed write transactions)
    pub fn wal_size_limit(mut self, commits: u32) -> Self {
        self.config.wal_size_limit = commits;
        self
    }

    /// Set the page cache budget (in pages)
    pub fn cache_size(mut self, pages: u32) -> Self {
        self.config.cache_size = pages;
        self
    }

    /// Set the page size for new databases (in bytes)
    pub fn page_size(mut self, bytes: u32) -> Self {
        self.config.page_size = bytes;
        self
    }

    /// Open the database read-only
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Set the busy timeout (in milliseconds)
    pub fn busy_timeout_ms(mut self, ms: u64) -> Self {
        self.config.busy_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
