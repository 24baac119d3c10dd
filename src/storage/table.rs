//! Ordered table
//!
//! A table maps a sort key to its stored payload. Tables are shared between
//! snapshots through `Arc` and copied only when a commit touches one that a
//! reader still pins.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    rows: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    /// Insert or overwrite a row
    pub fn insert(&mut self, key: Vec<u8>, payload: Vec<u8>) {
        self.rows.insert(key, payload);
    }

    pub fn remove(&mut self, key: &[u8]) -> bool {
        self.rows.remove(key).is_some()
    }

    /// Rows at or after `from`, in key order
    pub fn range_from<'a>(
        &'a self,
        from: Bound<&[u8]>,
    ) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.rows
            .range::<[u8], _>((from, Bound::Unbounded))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.rows.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Approximate bytes held by keys and payloads
    pub fn byte_size(&self) -> usize {
        self.rows.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}
