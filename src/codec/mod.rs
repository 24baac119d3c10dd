//! Record Codec
//!
//! Byte layouts shared by every table the store writes.
//!
//! ## Record Blob
//! ```text
//! ┌──────────────────┬────────────┬──────────────┐
//! │ Key Len (4, BE)  │ Key bytes  │ Value bytes  │
//! └──────────────────┴────────────┴──────────────┘
//! ```
//!
//! ## TTL Indexes
//! ```text
//! key-index:     user_key          → [Expiry ms (8, BE)]
//! expiry-index:  [Expiry (8, BE)][user_key] → (empty)
//! ```
//!
//! ## Registry Entry
//! ```text
//! ┌──────────────────┬─────────────┬──────────────────┐
//! │ Name Len (4, BE) │ Name bytes  │ Table Id (4, BE) │
//! └──────────────────┴─────────────┴──────────────────┘
//! ```

mod record;
mod expiry;
mod registry;

pub use record::{decode_record, encode_record, record_len, KEY_LEN_PREFIX, RECORD_SCRATCH_SIZE};
pub use expiry::{decode_expiry, encode_expiry, expiry_index_key, split_expiry_index_key, EXPIRY_LEN};
pub use registry::{decode_registry_entry, encode_registry_entry};
