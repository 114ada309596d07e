//! Bincode-backed coder
//!
//! Stock [`KeyCoder`] implementation over serde/bincode, used by the tests
//! and benchmarks and usable as-is by an owning cache whose keys and values
//! derive `Serialize`/`Deserialize`.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};
use super::KeyCoder;

/// Coder that round-trips keys and values through bincode
///
/// The zero-length byte sequence is the deleted-entry sentinel; bincode
/// never produces it for the usual key/value shapes (integers, strings,
/// structs), so live values and tombstones cannot collide.
#[derive(Debug, Default)]
pub struct BincodeCoder<K, V> {
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> BincodeCoder<K, V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// The raw form of a deleted entry under this coder
    pub fn tombstone_bytes() -> Vec<u8> {
        Vec::new()
    }
}

impl<K, V> KeyCoder<K, V> for BincodeCoder<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    fn key_encode(&self, key: &K) -> Result<Vec<u8>> {
        bincode::serialize(key).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn key_decode(&self, bytes: &[u8]) -> Result<K> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn value_encode(&self, value: &V) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn value_decode(&self, bytes: &[u8]) -> Result<V> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn is_tombstone(&self, raw: &[u8]) -> bool {
        raw.is_empty()
    }
}
