//! TTL timestamp encoding
//!
//! Expiry times are absolute epoch milliseconds stored as 8-byte big-endian
//! signed integers, so byte order equals time order for every real date.

use crate::error::{KvError, Result};

pub const EXPIRY_LEN: usize = 8;

pub fn encode_expiry(ms: i64) -> [u8; EXPIRY_LEN] {
    ms.to_be_bytes()
}

pub fn decode_expiry(bytes: &[u8]) -> Result<i64> {
    let raw: [u8; EXPIRY_LEN] = bytes.try_into().map_err(|_| {
        KvError::Corrupt(format!("expiry of {} bytes, expected {}", bytes.len(), EXPIRY_LEN))
    })?;
    Ok(i64::from_be_bytes(raw))
}

/// Key of an expiry-index row: `[expiry][user key]`
pub fn expiry_index_key(expiry: i64, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(EXPIRY_LEN + key.len());
    out.extend_from_slice(&encode_expiry(expiry));
    out.extend_from_slice(key);
    out
}

/// Inverse of [`expiry_index_key`]
pub fn split_expiry_index_key(composite: &[u8]) -> Result<(i64, &[u8])> {
    if composite.len() < EXPIRY_LEN {
        return Err(KvError::Corrupt(format!(
            "expiry index key of {} bytes",
            composite.len()
        )));
    }
    let (expiry, key) = composite.split_at(EXPIRY_LEN);
    Ok((decode_expiry(expiry)?, key))
}
