//! Iterator Engine
//!
//! Ordered scans over one column family, optionally limited to keys that
//! start with a prefix.
//!
//! ```text
//!   it = cf.iter()?;            positioned before the first entry
//!   it.first()?;                (prefix iterators start on their first match)
//!   while !it.eof() {
//!       it.key()?; it.value()?;
//!       it.next()?;
//!   }
//! ```
//!
//! The cursor only remembers its current key, so writes made while an
//! iterator is open (including lazy expiry of the keys it visits) never
//! invalidate it; the next move re-seeks in whatever transaction is open.

use std::sync::Arc;

use tracing::warn;

use crate::cf::ColumnFamily;
use crate::codec::decode_record;
use crate::error::{KvError, Result};
use crate::storage::Cursor;
use crate::store::{closed, StoreState};
use crate::ttl;
use crate::txn::TxnState;

pub struct KvIterator {
    cf: ColumnFamily,
    cursor: Cursor,
    eof: bool,
    prefix: Option<Vec<u8>>,
    key: Vec<u8>,
    value: Vec<u8>,

    /// Set when the current record failed to decode
    decode_error: Option<String>,

    /// The iterator opened the read transaction it runs in
    owns_txn: bool,

    /// Counted in the store's and column family's open iterators
    registered: bool,
}

impl KvIterator {
    pub(crate) fn open(cf: ColumnFamily, prefix: Option<Vec<u8>>) -> Result<Self> {
        let store = Arc::clone(&cf.store);
        let table = cf.cf.table;
        let mut iter = Self {
            cf,
            cursor: Cursor::new(table),
            eof: false,
            prefix,
            key: Vec::new(),
            value: Vec::new(),
            decode_error: None,
            owns_txn: false,
            registered: false,
        };

        store.run(|state| {
            iter.cf.cf.check_live()?;
            let conn = state.conn.as_ref().ok_or_else(closed)?;
            if state.open_iterators == 0 {
                state.txn.refresh_if_stale(conn);
            }
            iter.owns_txn = state.txn.ensure_read(conn);

            state.open_iterators += 1;
            iter.cf.cf.state.lock().open_iterators += 1;
            iter.registered = true;

            if iter.prefix.is_some() {
                iter.seek_start(state)?;
            }
            Ok(())
        })?;
        store.stats.record_iteration();
        Ok(iter)
    }

    pub fn column_family(&self) -> &ColumnFamily {
        &self.cf
    }

    /// Reposition on the first entry (the first prefix match, if any)
    pub fn first(&mut self) -> Result<()> {
        let store = Arc::clone(&self.cf.store);
        store.run(|state| {
            self.cf.cf.check_live()?;
            state.prepare_read()?;
            self.seek_start(state)
        })
    }

    /// Advance one entry; an iterator that was never positioned moves to
    /// the first entry
    pub fn next(&mut self) -> Result<()> {
        if self.eof {
            return Ok(());
        }
        let store = Arc::clone(&self.cf.store);
        store.run(|state| {
            self.cf.cf.check_live()?;
            state.prepare_read()?;
            let valid = self.cursor.next(state.txn.txn()?)?;
            self.settle(state, valid)
        })
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn key(&self) -> Result<&[u8]> {
        self.current()?;
        Ok(&self.key)
    }

    pub fn value(&self) -> Result<&[u8]> {
        self.current()?;
        Ok(&self.value)
    }

    fn current(&self) -> Result<()> {
        if let Some(msg) = &self.decode_error {
            return self.cf.store.report(Err(KvError::Corrupt(msg.clone())));
        }
        if self.eof || !self.cursor.is_valid() {
            return Err(KvError::Protocol("iterator is not positioned on an entry".to_string()));
        }
        Ok(())
    }

    fn seek_start(&mut self, state: &mut StoreState) -> Result<()> {
        let txn = state.txn.txn()?;
        let valid = match &self.prefix {
            Some(prefix) => self.cursor.seek(txn, prefix)?,
            None => self.cursor.first(txn)?,
        };
        self.settle(state, valid)
    }

    /// Load the row under the cursor, skipping expired keys; ends the
    /// iteration at the end of the table or the prefix
    fn settle(&mut self, state: &mut StoreState, mut valid: bool) -> Result<()> {
        self.decode_error = None;
        loop {
            let key = match (valid, self.cursor.key()) {
                (true, Some(key)) => key.to_vec(),
                _ => {
                    self.finish();
                    return Ok(());
                }
            };
            if let Some(prefix) = &self.prefix {
                if !key.starts_with(prefix) {
                    self.finish();
                    return Ok(());
                }
            }

            if let Some(expiry) = state.expiry_of(&self.cf.cf, &key)? {
                if expiry <= ttl::now_ms() {
                    state.expire(&self.cf.cf, &key)?;
                    valid = self.cursor.next(state.txn.txn()?)?;
                    continue;
                }
            }

            let txn = state.txn.txn()?;
            let payload = match self.cursor.payload(txn)? {
                Some(payload) => payload,
                None => {
                    valid = self.cursor.next(txn)?;
                    continue;
                }
            };
            self.eof = false;
            self.key.clear();
            self.value.clear();
            match decode_record(payload) {
                Ok((stored_key, value)) => {
                    self.key.extend_from_slice(stored_key);
                    self.value.extend_from_slice(value);
                }
                Err(e) => self.decode_error = Some(e.to_string()),
            }
            return Ok(());
        }
    }

    fn finish(&mut self) {
        self.eof = true;
        self.key.clear();
        self.value.clear();
    }
}

impl Drop for KvIterator {
    fn drop(&mut self) {
        if !self.registered {
            return;
        }
        let mut guard = self.cf.store.state.lock();
        let state = &mut *guard;
        state.open_iterators = state.open_iterators.saturating_sub(1);
        {
            let mut cf_state = self.cf.cf.state.lock();
            cf_state.open_iterators = cf_state.open_iterators.saturating_sub(1);
        }

        if self.owns_txn && state.txn.state() == TxnState::Read && !state.txn.is_explicit() {
            if let Some(conn) = state.conn.as_ref() {
                if let Err(e) = state.txn.commit(conn) {
                    warn!(error = %e, "failed to close iterator transaction");
                }
            }
        }
    }
}

impl std::fmt::Debug for KvIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvIterator")
            .field("cf", &self.cf.name())
            .field("prefix", &self.prefix)
            .field("eof", &self.eof)
            .finish()
    }
}
