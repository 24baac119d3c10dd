//! Record blob encoding
//!
//! Every data row is stored as `[be32 key length][key][value]`.

use std::borrow::Cow;

use bytes::BufMut;

use crate::error::{KvError, Result};

/// Size of the big-endian key length prefix
pub const KEY_LEN_PREFIX: usize = 4;

/// Stack scratch size callers use for small records
pub const RECORD_SCRATCH_SIZE: usize = 512;

/// Encoded length of a record
pub fn record_len(key: &[u8], value: &[u8]) -> usize {
    KEY_LEN_PREFIX + key.len() + value.len()
}

/// Encode a record, borrowing `scratch` when the blob fits in it
///
/// Falls back to a heap buffer otherwise. Fails with `NoMem` only when that
/// allocation fails.
pub fn encode_record<'a>(key: &[u8], value: &[u8], scratch: &'a mut [u8]) -> Result<Cow<'a, [u8]>> {
    let total = record_len(key, value);
    let key_len = u32::try_from(key.len())
        .map_err(|_| KvError::InvalidArgument(format!("key of {} bytes", key.len())))?;

    if total <= scratch.len() {
        let (prefix, rest) = scratch.split_at_mut(KEY_LEN_PREFIX);
        prefix.copy_from_slice(&key_len.to_be_bytes());
        rest[..key.len()].copy_from_slice(key);
        rest[key.len()..key.len() + value.len()].copy_from_slice(value);
        return Ok(Cow::Borrowed(&scratch[..total]));
    }

    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(total).map_err(|_| KvError::NoMem)?;
    buf.put_u32(key_len);
    buf.put_slice(key);
    buf.put_slice(value);
    Ok(Cow::Owned(buf))
}

/// Split a record blob into `(key, value)`
pub fn decode_record(blob: &[u8]) -> Result<(&[u8], &[u8])> {
    if blob.len() < KEY_LEN_PREFIX {
        return Err(KvError::Corrupt(format!(
            "record of {} bytes is shorter than its length prefix",
            blob.len()
        )));
    }
    let mut prefix = [0u8; KEY_LEN_PREFIX];
    prefix.copy_from_slice(&blob[..KEY_LEN_PREFIX]);
    let key_len = u32::from_be_bytes(prefix) as usize;

    let rest = &blob[KEY_LEN_PREFIX..];
    if key_len > rest.len() {
        return Err(KvError::Corrupt(format!(
            "record key length {} exceeds blob of {} bytes",
            key_len,
            blob.len()
        )));
    }
    Ok(rest.split_at(key_len))
}
