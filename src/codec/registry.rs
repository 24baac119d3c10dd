//! Column family registry entry encoding

use bytes::BufMut;

use crate::error::{KvError, Result};
use crate::storage::TableId;

pub fn encode_registry_entry(name: &str, table: TableId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + name.len());
    buf.put_u32(name.len() as u32);
    buf.put_slice(name.as_bytes());
    buf.put_u32(table);
    buf
}

pub fn decode_registry_entry(blob: &[u8]) -> Result<(&str, TableId)> {
    if blob.len() < 8 {
        return Err(KvError::Corrupt(format!("registry entry of {} bytes", blob.len())));
    }
    let name_len = u32::from_be_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
    if blob.len() != 8 + name_len {
        return Err(KvError::Corrupt(format!(
            "registry entry of {} bytes with name length {}",
            blob.len(),
            name_len
        )));
    }
    let name = std::str::from_utf8(&blob[4..4 + name_len])
        .map_err(|_| KvError::Corrupt("registry entry name is not UTF-8".to_string()))?;
    let tail = &blob[4 + name_len..];
    let table = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
    Ok((name, table))
}
