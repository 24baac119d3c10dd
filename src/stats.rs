//! Operation counters

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by a store
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    puts: AtomicU64,
    gets: AtomicU64,
    deletes: AtomicU64,
    iterations: AtomicU64,
    errors: AtomicU64,
}

impl StatCounters {
    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            puts: self.puts.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a store's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Successful puts, with or without TTL
    pub puts: u64,
    /// Point lookups, hits and misses alike
    pub gets: u64,
    /// Deletes that removed a key
    pub deletes: u64,
    /// Iterators created
    pub iterations: u64,
    /// Failed operations; not-found outcomes are not errors
    pub errors: u64,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "puts:       {}", self.puts)?;
        writeln!(f, "gets:       {}", self.gets)?;
        writeln!(f, "deletes:    {}", self.deletes)?;
        writeln!(f, "iterations: {}", self.iterations)?;
        write!(f, "errors:     {}", self.errors)
    }
}
