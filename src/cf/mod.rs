//! Column Families
//!
//! Independent ordered key spaces inside one store, each backed by its own
//! engine table.
//!
//! ## Components
//! - `registry`: name → table mapping stored in the registry table
//! - `handle`: reference-counted `ColumnFamily` handles

mod handle;
pub(crate) mod registry;

pub use handle::ColumnFamily;
pub(crate) use handle::{CfShared, CfState, TtlIndexPair};

use crate::error::{KvError, Result};

/// Name of the column family every store starts with
pub const DEFAULT_CF: &str = "default";

/// Names starting with this prefix are reserved for internal column families
pub const RESERVED_PREFIX: &str = "__";

/// Longest accepted column family name, in bytes
pub const MAX_CF_NAME_LEN: usize = 255;

pub fn is_hidden(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Check a user-supplied column family name
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(KvError::InvalidArgument("column family name is empty".to_string()));
    }
    if name.len() > MAX_CF_NAME_LEN {
        return Err(KvError::InvalidArgument(format!(
            "column family name of {} bytes exceeds {}",
            name.len(),
            MAX_CF_NAME_LEN
        )));
    }
    if is_hidden(name) {
        return Err(KvError::InvalidArgument(format!(
            "column family names starting with '{}' are reserved",
            RESERVED_PREFIX
        )));
    }
    Ok(())
}
