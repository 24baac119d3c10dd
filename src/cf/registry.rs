//! Column family registry
//!
//! Maps CF names to tables through a dedicated registry table. Rows are
//! keyed by an 8-byte big-endian slot number derived from a 63-bit FNV-1a
//! hash of the name; collisions probe the following slots.
//!
//! ```text
//! slot(name, probe) = (fnv1a63(name) + probe) mod 2^63,   probe < MAX_PROBES
//!
//!   empty slot          -> name absent (and the insert position)
//!   entry with our name -> found
//!   other name          -> keep probing
//! ```
//!
//! Removal shifts later members of the probe run back so that lookups can
//! keep stopping at the first empty slot.

use crate::codec::{decode_record, decode_registry_entry, encode_record, encode_registry_entry, RECORD_SCRATCH_SIZE};
use crate::error::{KvError, Result};
use crate::storage::{Cursor, TableId, Transaction, META_CF_COUNT};

/// Longest probe sequence before giving up
pub const MAX_PROBES: u64 = 64;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;
const SLOT_MASK: u64 = (1 << 63) - 1;

/// 63-bit FNV-1a hash of a CF name
pub fn fnv1a63(name: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in name {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash & SLOT_MASK
}

fn slot_for(hash: u64, probe: u64) -> u64 {
    hash.wrapping_add(probe) & SLOT_MASK
}

fn slot_key(slot: u64) -> [u8; 8] {
    slot.to_be_bytes()
}

/// A decoded registry row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub slot: u64,
    pub name: String,
    pub table: TableId,
}

fn read_slot(txn: &Transaction, registry: TableId, slot: u64) -> Result<Option<(String, TableId)>> {
    match txn.get(registry, &slot_key(slot))? {
        Some(payload) => {
            let (_, value) = decode_record(payload)?;
            let (name, table) = decode_registry_entry(value)?;
            Ok(Some((name.to_string(), table)))
        }
        None => Ok(None),
    }
}

fn write_slot(txn: &mut Transaction, registry: TableId, slot: u64, name: &str, table: TableId) -> Result<()> {
    let key = slot_key(slot);
    let entry = encode_registry_entry(name, table);
    let mut scratch = [0u8; RECORD_SCRATCH_SIZE];
    let blob = encode_record(&key, &entry, &mut scratch)?;
    txn.insert(registry, &key, &blob)?;
    Ok(())
}

/// Resolve a name to its table
pub fn lookup(txn: &Transaction, registry: TableId, name: &str) -> Result<Option<TableId>> {
    Ok(find(txn, registry, name)?.map(|entry| entry.table))
}

fn find(txn: &Transaction, registry: TableId, name: &str) -> Result<Option<RegistryEntry>> {
    let hash = fnv1a63(name.as_bytes());
    for probe in 0..MAX_PROBES {
        let slot = slot_for(hash, probe);
        match read_slot(txn, registry, slot)? {
            None => return Ok(None),
            Some((stored, table)) if stored == name => {
                return Ok(Some(RegistryEntry { slot, name: stored, table }))
            }
            Some(_) => continue,
        }
    }
    Ok(None)
}

/// First free slot on the probe path of `name`
fn free_slot(txn: &Transaction, registry: TableId, name: &str) -> Result<u64> {
    let hash = fnv1a63(name.as_bytes());
    for probe in 0..MAX_PROBES {
        let slot = slot_for(hash, probe);
        match read_slot(txn, registry, slot)? {
            None => return Ok(slot),
            Some((stored, _)) if stored == name => {
                return Err(KvError::AlreadyExists(format!("column family '{}'", name)))
            }
            Some(_) => continue,
        }
    }
    Err(KvError::Full(format!(
        "no free registry slot for '{}' within {} probes",
        name, MAX_PROBES
    )))
}

fn adjust_cf_count(txn: &mut Transaction, delta: i64) -> Result<()> {
    let count = txn.meta(META_CF_COUNT) as i64 + delta;
    txn.set_meta(META_CF_COUNT, count.max(0) as u32)?;
    Ok(())
}

/// Allocate a table for `name` and register it
///
/// Must run inside a write transaction. Fails with `AlreadyExists` when the
/// name is taken and `Full` when its probe window has no free slot.
pub fn create(txn: &mut Transaction, registry: TableId, name: &str) -> Result<TableId> {
    let slot = free_slot(txn, registry, name)?;
    let table = txn.create_table()?;
    write_slot(txn, registry, slot, name, table)?;
    adjust_cf_count(txn, 1)?;
    Ok(table)
}

/// Open `name`, creating it when absent
pub fn create_or_open(txn: &mut Transaction, registry: TableId, name: &str) -> Result<TableId> {
    match lookup(txn, registry, name)? {
        Some(table) => Ok(table),
        None => create(txn, registry, name),
    }
}

/// Unregister `name` and drop its table; returns the dropped table
pub fn remove(txn: &mut Transaction, registry: TableId, name: &str) -> Result<Option<TableId>> {
    let entry = match find(txn, registry, name)? {
        Some(entry) => entry,
        None => return Ok(None),
    };
    txn.delete(registry, &slot_key(entry.slot))?;
    txn.drop_table(entry.table)?;
    adjust_cf_count(txn, -1)?;
    close_gap(txn, registry, entry.slot)?;
    Ok(Some(entry.table))
}

/// Re-place the entries that follow a freed slot
///
/// Any entry in the run after `freed` may have probed past it; lifting the
/// run out and reinserting each entry puts it back on an unbroken path.
fn close_gap(txn: &mut Transaction, registry: TableId, freed: u64) -> Result<()> {
    let mut displaced = Vec::new();
    for step in 1..MAX_PROBES {
        let slot = slot_for(freed, step);
        match read_slot(txn, registry, slot)? {
            Some((name, table)) => {
                txn.delete(registry, &slot_key(slot))?;
                displaced.push((name, table));
            }
            None => break,
        }
    }
    for (name, table) in displaced {
        let slot = free_slot(txn, registry, &name)?;
        write_slot(txn, registry, slot, &name, table)?;
    }
    Ok(())
}

/// Every registry row, in slot order
pub fn entries(txn: &Transaction, registry: TableId) -> Result<Vec<RegistryEntry>> {
    let mut out = Vec::new();
    let mut cursor = Cursor::new(registry);
    let mut valid = cursor.first(txn)?;
    while valid {
        if let (Some(key), Some(payload)) = (cursor.key(), cursor.payload(txn)?) {
            out.push(decode_row(key, payload)?);
        }
        valid = cursor.next(txn)?;
    }
    Ok(out)
}

/// Decode one registry row, checking that the record agrees with its sort key
pub fn decode_row(sort_key: &[u8], payload: &[u8]) -> Result<RegistryEntry> {
    let slot_bytes: [u8; 8] = sort_key
        .try_into()
        .map_err(|_| KvError::Corrupt(format!("registry key of {} bytes", sort_key.len())))?;
    let (key, value) = decode_record(payload)?;
    if key != sort_key {
        return Err(KvError::Corrupt("registry record key differs from its slot".to_string()));
    }
    let (name, table) = decode_registry_entry(value)?;
    Ok(RegistryEntry {
        slot: u64::from_be_bytes(slot_bytes),
        name: name.to_string(),
        table,
    })
}
