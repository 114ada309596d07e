//! Key/value coder contract
//!
//! The page layer stores keys and values it cannot interpret on its own; a
//! coder supplies the round-trip between typed keys/values and byte
//! sequences, plus the tombstone predicate consulted during lazy value
//! materialization. Pages trust the round-trip and do not validate it.

mod bincode;

pub use bincode::BincodeCoder;

use crate::error::Result;

/// Serialization seam between typed keys/values and persisted bytes
///
/// ## Contract
/// - `key_decode(key_encode(k)) == k` and likewise for values; the page
///   layer relies on this without checking it.
/// - `key_encode` must produce at least one byte for every real key: the
///   zero-length encoding is reserved for the unbounded upper interval
///   bound in the page blob format.
pub trait KeyCoder<K, V> {
    /// Encode a key to bytes (never empty, see the trait contract)
    fn key_encode(&self, key: &K) -> Result<Vec<u8>>;

    /// Decode a key from bytes
    fn key_decode(&self, bytes: &[u8]) -> Result<K>;

    /// Encode a value to bytes
    fn value_encode(&self, value: &V) -> Result<Vec<u8>>;

    /// Decode a value from bytes
    fn value_decode(&self, bytes: &[u8]) -> Result<V>;

    /// Whether a raw value is the deleted-entry sentinel
    ///
    /// Raw bytes recognized here are never materialized into a value; the
    /// entry stays absent permanently.
    fn is_tombstone(&self, raw: &[u8]) -> bool;

    /// In-memory footprint of a key, used by the deep estimation strategy.
    /// Defaults to the encoded length.
    fn key_mem_estimate(&self, key: &K) -> Result<u64> {
        Ok(self.key_encode(key)?.len() as u64)
    }

    /// In-memory footprint of a value, used by the deep estimation strategy.
    /// Defaults to the encoded length.
    fn value_mem_estimate(&self, value: &V) -> Result<u64> {
        Ok(self.value_encode(value)?.len() as u64)
    }
}
