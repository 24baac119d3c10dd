//! Store / Handle layer
//!
//! `Store` is the entry point: it opens the engine, bootstraps a new
//! database, and owns the state every handle shares.
//!
//! ## Locking
//! ```text
//!   Store ──► StoreShared ──► Mutex<StoreState>   connection, transaction,
//!     │            ▲                              registry, open CFs
//!     │            │
//!   ColumnFamily ──┼──► Arc<CfShared> ──► Mutex<CfState>   TTL pair, flags
//!   KvIterator ────┘
//! ```
//! Locks are always taken store first, then column family. Every public
//! call takes the store lock once and runs to completion under it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cf::{self, registry, CfShared, ColumnFamily, DEFAULT_CF};
use crate::codec::{decode_record, encode_record, RECORD_SCRATCH_SIZE};
use crate::config::{CheckpointMode, Config, JournalMode};
use crate::error::{KvError, Result};
use crate::iterator::KvIterator;
use crate::stats::{StatCounters, Stats};
use crate::storage::{
    Connection, Cursor, TableId, Transaction, META_CF_COUNT, META_DEFAULT_CF_TABLE,
    META_REGISTRY_TABLE,
};
use crate::ttl;
use crate::txn::{TxnController, TxnState};

/// Largest accepted key, in bytes
pub const MAX_KEY_LEN: usize = 64 * 1024;

/// Largest accepted value, in bytes
pub const MAX_VALUE_LEN: usize = 10 * 1024 * 1024;

/// Integrity check stops collecting after this many problems
const MAX_REPORTED_PROBLEMS: usize = 100;

// =============================================================================
// Shared State
// =============================================================================

pub(crate) struct StoreShared {
    pub(crate) state: Mutex<StoreState>,
    pub(crate) stats: StatCounters,
    config: Config,
    path: Option<PathBuf>,
}

pub(crate) struct StoreState {
    /// `None` once the store is closed
    pub(crate) conn: Option<Connection>,
    pub(crate) txn: TxnController,
    pub(crate) registry_table: TableId,
    pub(crate) default_cf: Option<Arc<CfShared>>,
    pub(crate) open_cfs: HashMap<String, Weak<CfShared>>,
    /// Column families created by the open write transaction
    pub(crate) uncommitted_cfs: Vec<(String, Weak<CfShared>)>,
    pub(crate) corrupted: bool,
    pub(crate) last_error: Option<String>,
    pub(crate) open_iterators: usize,
}

pub(crate) fn closed() -> KvError {
    KvError::Protocol("store is closed".to_string())
}

impl StoreShared {
    /// Run one public operation under the store lock
    ///
    /// Refused on a closed or corrupted store. Errors other than `NotFound`
    /// are counted and remembered for `errmsg`.
    pub(crate) fn run<T>(&self, op: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        self.run_checked(true, op)
    }

    fn run_checked<T>(
        &self,
        refuse_corrupt: bool,
        op: impl FnOnce(&mut StoreState) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let result = if state.conn.is_none() {
            Err(closed())
        } else if refuse_corrupt && state.corrupted {
            Err(KvError::Corrupt(
                "store is marked corrupt; reopen it to continue".to_string(),
            ))
        } else {
            op(state)
        };
        self.finish(state, result)
    }

    /// Record the outcome of an operation completed outside `run`
    pub(crate) fn report<T>(&self, result: Result<T>) -> Result<T> {
        let mut guard = self.state.lock();
        self.finish(&mut guard, result)
    }

    fn finish<T>(&self, state: &mut StoreState, result: Result<T>) -> Result<T> {
        state.settle_transaction();
        if let Err(e) = &result {
            if !e.is_not_found() {
                self.stats.record_error();
                state.last_error = Some(e.to_string());
                if e.is_corrupt() && !state.corrupted {
                    warn!(error = %e, "corruption detected; store refuses further operations");
                    state.corrupted = true;
                }
            }
        }
        result
    }

    fn close(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let conn = match state.conn.take() {
            Some(conn) => conn,
            None => return,
        };
        state.txn.release(&conn);
        state.open_cfs.clear();
        state.uncommitted_cfs.clear();
        state.default_cf = None;
        debug!(path = ?self.path, "closed store");
    }
}

// =============================================================================
// Store State Helpers
// =============================================================================

impl StoreState {
    pub(crate) fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(closed)
    }

    /// Make sure a transaction is open, moving the persistent read forward
    /// when no iterator depends on it
    pub(crate) fn prepare_read(&mut self) -> Result<()> {
        let conn = self.conn.as_ref().ok_or_else(closed)?;
        if self.open_iterators == 0 {
            self.txn.refresh_if_stale(conn);
        }
        self.txn.ensure_read(conn);
        Ok(())
    }

    /// Run `f` inside a write transaction
    ///
    /// Reuses the caller's explicit write transaction, otherwise opens one
    /// and commits it (or rolls it back when `f` fails).
    pub(crate) fn write_op<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let owned = {
            let conn = self.conn.as_ref().ok_or_else(closed)?;
            self.txn.begin_autocommit_write(conn)?
        };
        let result = f(self);
        let conn = self.conn.as_ref().ok_or_else(closed)?;
        self.txn.finish_autocommit(conn, owned, result)
    }

    /// Whether a lazy delete may open a write transaction right now
    pub(crate) fn can_write_lazily(&self) -> bool {
        match &self.conn {
            Some(conn) if !conn.is_read_only() => {
                !(self.txn.state() == TxnState::Read && self.txn.is_explicit())
            }
            _ => false,
        }
    }

    /// Bring cached column family state in line with how the last write
    /// transaction ended
    ///
    /// After a discarded write, handles created by it are dead and every
    /// cached TTL pair is forgotten, since the tables it named never existed.
    pub(crate) fn settle_transaction(&mut self) {
        if self.txn.take_discarded_write() {
            for (name, weak) in self.uncommitted_cfs.drain(..) {
                if let Some(handle) = weak.upgrade() {
                    handle.state.lock().dropped = true;
                }
                if self.open_cfs.get(&name).map_or(false, |open| open.ptr_eq(&weak)) {
                    self.open_cfs.remove(&name);
                }
                debug!(name = %name, "discarded uncommitted column family");
            }
            let open = self.open_cfs.values().filter_map(Weak::upgrade);
            for handle in self.default_cf.iter().cloned().chain(open) {
                handle.state.lock().forget_ttl();
            }
        } else if self.txn.state() != TxnState::Write {
            self.uncommitted_cfs.clear();
        }
    }

    fn default_cf(&self) -> Result<Arc<CfShared>> {
        self.default_cf.clone().ok_or_else(closed)
    }

    pub(crate) fn insert_record(&mut self, table: TableId, key: &[u8], value: &[u8]) -> Result<()> {
        let mut scratch = [0u8; RECORD_SCRATCH_SIZE];
        let blob = encode_record(key, value, &mut scratch)?;
        self.txn.txn_mut()?.insert(table, key, &blob)?;
        Ok(())
    }

    /// Value stored under `key`, ignoring TTL
    pub(crate) fn read_value(&mut self, cf: &CfShared, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let payload = match self.txn.read_payload(cf.table, key)? {
            Some(payload) => payload,
            None => return Ok(None),
        };
        let (stored_key, value) = decode_record(&payload)?;
        if stored_key != key {
            return Err(KvError::Corrupt(format!(
                "record in column family '{}' does not match its key",
                cf.name
            )));
        }
        Ok(Some(value.to_vec()))
    }

    // =========================================================================
    // Data Operations
    // =========================================================================

    pub(crate) fn put(&mut self, cf: &CfShared, key: &[u8], value: &[u8]) -> Result<()> {
        validate_key(key)?;
        validate_value(value)?;
        cf.check_live()?;
        self.write_op(|s| {
            s.insert_record(cf.table, key, value)?;
            s.clear_ttl(cf, key)
        })
    }

    pub(crate) fn delete(&mut self, cf: &CfShared, key: &[u8]) -> Result<()> {
        validate_key(key)?;
        cf.check_live()?;
        let removed_live = self.write_op(|s| {
            let expired = match s.expiry_of(cf, key)? {
                Some(expiry) => expiry <= ttl::now_ms(),
                None => false,
            };
            let existed = s.delete_entry(cf, key)?;
            Ok(existed && !expired)
        })?;
        if removed_live {
            Ok(())
        } else {
            Err(KvError::NotFound)
        }
    }

    // =========================================================================
    // Column Families
    // =========================================================================

    fn create_cf(&mut self, name: &str) -> Result<Arc<CfShared>> {
        cf::validate_name(name)?;
        if name == DEFAULT_CF {
            return Err(KvError::AlreadyExists(format!("column family '{}'", name)));
        }
        let registry_table = self.registry_table;
        let table = self.write_op(|s| registry::create(s.txn.txn_mut()?, registry_table, name))?;

        let handle = CfShared::new(name, table);
        self.open_cfs.insert(name.to_string(), Arc::downgrade(&handle));
        if self.txn.state() == TxnState::Write {
            self.uncommitted_cfs.push((name.to_string(), Arc::downgrade(&handle)));
        }
        debug!(name, table, "created column family");
        Ok(handle)
    }

    fn open_cf(&mut self, name: &str) -> Result<Arc<CfShared>> {
        if name == DEFAULT_CF {
            return self.default_cf();
        }
        cf::validate_name(name)?;

        self.prepare_read()?;
        let table = registry::lookup(self.txn.txn()?, self.registry_table, name)?
            .ok_or(KvError::NotFound)?;
        if let Some(open) = self.open_cfs.get(name).and_then(Weak::upgrade) {
            if open.table == table && open.check_live().is_ok() {
                return Ok(open);
            }
        }
        let handle = CfShared::new(name, table);
        self.open_cfs.insert(name.to_string(), Arc::downgrade(&handle));
        Ok(handle)
    }

    fn drop_cf(&mut self, name: &str) -> Result<()> {
        if name == DEFAULT_CF {
            return Err(KvError::InvalidArgument(
                "the default column family cannot be dropped".to_string(),
            ));
        }
        cf::validate_name(name)?;

        let open = self.open_cfs.get(name).and_then(Weak::upgrade);
        if let Some(handle) = &open {
            let iterators = handle.state.lock().open_iterators;
            if iterators > 0 {
                return Err(KvError::Locked(format!(
                    "column family '{}' has {} open iterator(s)",
                    name, iterators
                )));
            }
        }

        let registry_table = self.registry_table;
        let dropped = self.write_op(|s| {
            let txn = s.txn.txn_mut()?;
            let table = registry::remove(txn, registry_table, name)?;
            if table.is_some() {
                registry::remove(txn, registry_table, &ttl::key_index_name(name))?;
                registry::remove(txn, registry_table, &ttl::expiry_index_name(name))?;
            }
            Ok(table)
        })?;
        let table = dropped.ok_or(KvError::NotFound)?;

        if let Some(handle) = open {
            handle.state.lock().dropped = true;
        }
        self.open_cfs.remove(name);
        debug!(name, table, "dropped column family");
        Ok(())
    }

    fn list_cfs(&mut self) -> Result<Vec<String>> {
        self.prepare_read()?;
        let mut names: Vec<String> = registry::entries(self.txn.txn()?, self.registry_table)?
            .into_iter()
            .map(|entry| entry.name)
            .filter(|name| !cf::is_hidden(name))
            .collect();
        names.sort();
        names.insert(0, DEFAULT_CF.to_string());
        Ok(names)
    }

    // =========================================================================
    // Integrity
    // =========================================================================

    fn integrity_check(&mut self) -> Result<()> {
        self.prepare_read()?;
        let conn = self.conn.as_ref().ok_or_else(closed)?;
        let txn = self.txn.txn()?;
        let registry_table = self.registry_table;

        let mut problems = Vec::new();
        let default_table = txn.meta(META_DEFAULT_CF_TABLE);
        let mut roots = vec![registry_table, default_table];
        let mut tables = vec![(DEFAULT_CF.to_string(), default_table)];

        if txn.meta(META_REGISTRY_TABLE) != registry_table {
            problems.push(format!(
                "registry table moved from {} to {}",
                registry_table,
                txn.meta(META_REGISTRY_TABLE)
            ));
        }

        if txn.has_table(registry_table) {
            let mut entries = 0usize;
            let mut cursor = Cursor::new(registry_table);
            let mut valid = cursor.first(txn)?;
            while valid {
                if let (Some(key), Some(payload)) = (cursor.key(), cursor.payload(txn)?) {
                    entries += 1;
                    match registry::decode_row(key, payload) {
                        Ok(entry) => {
                            roots.push(entry.table);
                            tables.push((entry.name, entry.table));
                        }
                        Err(e) => problems.push(format!("registry row {:02x?}: {}", key, e)),
                    }
                }
                valid = cursor.next(txn)?;
            }
            let stored = txn.meta(META_CF_COUNT) as usize;
            if stored != entries + 1 {
                problems.push(format!(
                    "column family count is {} but {} column families exist",
                    stored,
                    entries + 1
                ));
            }
        }

        problems.extend(conn.integrity_check(txn, &roots));

        for (name, table) in &tables {
            if problems.len() >= MAX_REPORTED_PROBLEMS {
                break;
            }
            if txn.has_table(*table) {
                check_records(txn, name, *table, &mut problems)?;
            }
        }

        if problems.is_empty() {
            return Ok(());
        }
        problems.truncate(MAX_REPORTED_PROBLEMS);
        Err(KvError::Corrupt(problems.join("; ")))
    }
}

/// Every row decodes and agrees with its sort key; TTL index rows have the
/// expected shapes
fn check_records(
    txn: &Transaction,
    name: &str,
    table: TableId,
    problems: &mut Vec<String>,
) -> Result<()> {
    let kind = ttl::index_kind(name);
    let mut cursor = Cursor::new(table);
    let mut valid = cursor.first(txn)?;
    while valid && problems.len() < MAX_REPORTED_PROBLEMS {
        if let (Some(sort_key), Some(payload)) = (cursor.key(), cursor.payload(txn)?) {
            match decode_record(payload) {
                Ok((key, value)) => {
                    if key != sort_key {
                        problems.push(format!("'{}': record key differs from its sort key", name));
                    }
                    if let Some(problem) = kind.and_then(|kind| kind.check_row(key, value)) {
                        problems.push(format!("'{}': {}", name, problem));
                    }
                }
                Err(e) => problems.push(format!("'{}': {}", name, e)),
            }
        }
        valid = cursor.next(txn)?;
    }
    Ok(())
}

pub(crate) fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(KvError::InvalidArgument("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(KvError::InvalidArgument(format!(
            "key of {} bytes exceeds {}",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    Ok(())
}

pub(crate) fn validate_value(value: &[u8]) -> Result<()> {
    if value.len() > MAX_VALUE_LEN {
        return Err(KvError::InvalidArgument(format!(
            "value of {} bytes exceeds {}",
            value.len(),
            MAX_VALUE_LEN
        )));
    }
    Ok(())
}

// =============================================================================
// Bootstrap
// =============================================================================

/// Registry and default column family tables, if the database has them
fn existing_roots(txn: &Transaction) -> Result<Option<(TableId, TableId)>> {
    let registry_table = txn.meta(META_REGISTRY_TABLE);
    if registry_table == 0 {
        return Ok(None);
    }
    let default_table = txn.meta(META_DEFAULT_CF_TABLE);
    for (what, table) in [("registry", registry_table), ("default column family", default_table)] {
        if !txn.has_table(table) {
            return Err(KvError::Corrupt(format!("{} table {} is missing", what, table)));
        }
    }
    Ok(Some((registry_table, default_table)))
}

/// Find the root tables, creating them when the database is new
fn bootstrap(conn: &Connection) -> Result<(TableId, TableId)> {
    if let Some(roots) = existing_roots(&conn.begin_read())? {
        return Ok(roots);
    }
    if conn.is_read_only() {
        return Err(KvError::ReadOnly(
            "cannot initialise a new database in read-only mode".to_string(),
        ));
    }

    let mut txn = conn.begin_write()?;
    // Another store may have bootstrapped while we waited for the write slot
    if let Some(roots) = existing_roots(&txn)? {
        conn.rollback(txn);
        return Ok(roots);
    }
    let registry_table = txn.create_table()?;
    let default_table = txn.create_table()?;
    txn.set_meta(META_REGISTRY_TABLE, registry_table)?;
    txn.set_meta(META_DEFAULT_CF_TABLE, default_table)?;
    txn.set_meta(META_CF_COUNT, 1)?;
    conn.commit(txn)?;

    debug!(registry_table, default_table, "initialised new database");
    Ok((registry_table, default_table))
}

// =============================================================================
// Public Store
// =============================================================================

/// An open key-value store
///
/// Dropping the store closes it; handles and iterators that outlive it fail
/// with `Protocol`.
pub struct Store {
    shared: Arc<StoreShared>,
}

impl Store {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        Self::open_at(Some(path.as_ref()), config)
    }

    /// Open a private database that lives only as long as the store
    pub fn open_in_memory(config: Config) -> Result<Self> {
        Self::open_at(None, config)
    }

    /// Open with default settings and the given journal mode
    pub fn open_default<P: AsRef<Path>>(path: P, journal_mode: JournalMode) -> Result<Self> {
        let config = Config::builder().journal_mode(journal_mode).build();
        Self::open(path, config)
    }

    fn open_at(path: Option<&Path>, config: Config) -> Result<Self> {
        let config = config.normalized()?;
        let conn = Connection::open(path, &config)?;
        let (registry_table, default_table) = bootstrap(&conn)?;

        let mut txn = TxnController::new(config.wal_size_limit);
        txn.open_persistent_read(&conn);

        let default_cf = CfShared::new(DEFAULT_CF, default_table);
        {
            let mut cf_state = default_cf.state.lock();
            let pair = ttl::resolve_pair(txn.txn()?, registry_table, &default_cf, &mut cf_state)?;
            if let Some(pair) = pair {
                debug!(?pair, "default column family has TTL indexes");
            }
        }

        debug!(
            path = ?path,
            journal = ?config.journal_mode,
            page_size = conn.page_size(),
            cache_size = conn.cache_size(),
            "opened store"
        );

        let state = StoreState {
            conn: Some(conn),
            txn,
            registry_table,
            default_cf: Some(default_cf),
            open_cfs: HashMap::new(),
            uncommitted_cfs: Vec::new(),
            corrupted: false,
            last_error: None,
            open_iterators: 0,
        };
        Ok(Self {
            shared: Arc::new(StoreShared {
                state: Mutex::new(state),
                stats: StatCounters::default(),
                config,
                path: path.map(Path::to_path_buf),
            }),
        })
    }

    /// Roll back any open transaction and release the engine
    pub fn close(self) {
        self.shared.close();
    }

    pub fn path(&self) -> Option<&Path> {
        self.shared.path.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub fn begin(&self, write: bool) -> Result<()> {
        self.shared.run(|state| {
            let conn = state.conn.as_ref().ok_or_else(closed)?;
            if state.open_iterators == 0 {
                state.txn.refresh_if_stale(conn);
            }
            state.txn.begin(conn, write)
        })
    }

    pub fn commit(&self) -> Result<()> {
        self.shared.run(|state| {
            let conn = state.conn.as_ref().ok_or_else(closed)?;
            state.txn.commit(conn)
        })
    }

    pub fn rollback(&self) -> Result<()> {
        self.shared.run(|state| {
            let conn = state.conn.as_ref().ok_or_else(closed)?;
            state.txn.rollback(conn);
            Ok(())
        })
    }

    /// Current transaction state; `Read` between operations
    pub fn txn_state(&self) -> TxnState {
        self.shared.state.lock().txn.state()
    }

    // =========================================================================
    // Column Families
    // =========================================================================

    fn handle(&self, cf: Arc<CfShared>) -> ColumnFamily {
        ColumnFamily::new(Arc::clone(&self.shared), cf)
    }

    pub fn cf_default(&self) -> Result<ColumnFamily> {
        let cf = self.shared.run(|state| state.default_cf())?;
        Ok(self.handle(cf))
    }

    pub fn cf_create(&self, name: &str) -> Result<ColumnFamily> {
        let cf = self.shared.run(|state| state.create_cf(name))?;
        Ok(self.handle(cf))
    }

    pub fn cf_open(&self, name: &str) -> Result<ColumnFamily> {
        let cf = self.shared.run(|state| state.open_cf(name))?;
        Ok(self.handle(cf))
    }

    /// Drop a column family with its TTL indexes
    ///
    /// Handles still referring to it fail afterwards with `Protocol`.
    pub fn cf_drop(&self, name: &str) -> Result<()> {
        self.shared.run(|state| state.drop_cf(name))
    }

    /// Visible column family names, `default` first
    pub fn cf_list(&self) -> Result<Vec<String>> {
        self.shared.run(|state| state.list_cfs())
    }

    // =========================================================================
    // Default Column Family
    // =========================================================================

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.cf_default()?.put(key, value)
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.cf_default()?.get(key)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.cf_default()?.delete(key)
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.cf_default()?.exists(key)
    }

    pub fn put_with_ttl(&self, key: &[u8], value: &[u8], expiry_ms: i64) -> Result<()> {
        self.cf_default()?.put_with_ttl(key, value, expiry_ms)
    }

    pub fn get_with_ttl(&self, key: &[u8]) -> Result<(Vec<u8>, i64)> {
        self.cf_default()?.get_with_ttl(key)
    }

    pub fn ttl_remaining(&self, key: &[u8]) -> Result<i64> {
        self.cf_default()?.ttl_remaining(key)
    }

    pub fn purge_expired(&self) -> Result<u64> {
        self.cf_default()?.purge_expired()
    }

    pub fn iter(&self) -> Result<KvIterator> {
        self.cf_default()?.iter()
    }

    pub fn prefix_iter(&self, prefix: &[u8]) -> Result<KvIterator> {
        self.cf_default()?.prefix_iter(prefix)
    }

    // =========================================================================
    // Diagnostics and Maintenance
    // =========================================================================

    pub fn stats(&self) -> Stats {
        self.shared.stats.snapshot()
    }

    /// Message of the most recent error, `"no error"` before the first
    pub fn errmsg(&self) -> String {
        self.shared
            .state
            .lock()
            .last_error
            .clone()
            .unwrap_or_else(|| "no error".to_string())
    }

    pub fn is_corrupted(&self) -> bool {
        self.shared.state.lock().corrupted
    }

    /// Verify engine structure, the registry, and every stored record
    ///
    /// Failure reports `Corrupt` with every problem found and marks the
    /// store corrupt.
    pub fn integrity_check(&self) -> Result<()> {
        self.shared.run_checked(false, |state| state.integrity_check())
    }

    /// Flush committed data to stable storage
    pub fn sync(&self) -> Result<()> {
        self.shared.run(|state| Ok(state.conn()?.sync()?))
    }

    /// Reclaim free space; `0` reclaims everything
    ///
    /// The engine always compacts the whole file, so any page count does.
    pub fn incremental_vacuum(&self, pages: u32) -> Result<()> {
        self.shared.run(|state| {
            if state.txn.state() == TxnState::Write {
                return Err(KvError::Busy(
                    "cannot vacuum while a write transaction is open".to_string(),
                ));
            }
            let written = state.conn()?.vacuum()?;
            debug!(pages, bytes = written, "vacuum");
            Ok(())
        })
    }

    /// Checkpoint the write-ahead log; returns `(log frames, checkpointed frames)`
    pub fn checkpoint(&self, mode: CheckpointMode) -> Result<(u64, u64)> {
        self.shared.run(|state| {
            let conn = state.conn.as_ref().ok_or_else(closed)?;
            state.txn.checkpoint(conn, mode)
        })
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.shared.path)
            .field("journal_mode", &self.shared.config.journal_mode)
            .finish()
    }
}
