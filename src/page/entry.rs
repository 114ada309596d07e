//! Page entries
//!
//! One entry per key in the page's interval. A freshly written entry holds a
//! materialized value with no raw form; a freshly decoded entry holds only
//! its raw bytes until [`fetch_value`] materializes it. Tombstone-recognized
//! raw bytes materialize to a permanently absent value.
//!
//! [`fetch_value`]: crate::page::PageWriteGuard::fetch_value

use bytes::Bytes;

use crate::coder::KeyCoder;
use crate::error::Result;

/// The value side of a page entry
#[derive(Debug, Clone)]
pub enum Slot<V> {
    /// Undecoded bytes straight from a persisted blob
    Raw(Bytes),

    /// A live value; `raw` retains the encoded form when the value came
    /// from disk, sparing a re-encode on the next persist
    Materialized { value: V, raw: Option<Bytes> },

    /// Raw bytes the coder recognized as a deleted-entry sentinel; the
    /// bytes are kept so a re-encode preserves the sentinel
    Absent { raw: Bytes },
}

/// A single key/value entry of a page
#[derive(Debug, Clone)]
pub struct PageEntry<K, V> {
    key: K,
    slot: Slot<V>,
}

impl<K, V> PageEntry<K, V> {
    /// Entry for a value written in memory (no raw form yet)
    pub fn new(key: K, value: V) -> Self {
        Self {
            key,
            slot: Slot::Materialized { value, raw: None },
        }
    }

    /// Entry for undecoded raw bytes loaded from a persisted blob
    pub fn from_raw(key: K, raw: Bytes) -> Self {
        Self {
            key,
            slot: Slot::Raw(raw),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn slot(&self) -> &Slot<V> {
        &self.slot
    }

    /// The materialized value, if any
    ///
    /// `None` both for entries not yet materialized and for tombstones;
    /// [`is_tombstone`](Self::is_tombstone) distinguishes the two.
    pub fn value(&self) -> Option<&V> {
        match &self.slot {
            Slot::Materialized { value, .. } => Some(value),
            Slot::Raw(_) | Slot::Absent { .. } => None,
        }
    }

    /// The raw encoded form, if one is cached
    pub fn raw(&self) -> Option<&Bytes> {
        match &self.slot {
            Slot::Raw(raw) | Slot::Absent { raw } => Some(raw),
            Slot::Materialized { raw, .. } => raw.as_ref(),
        }
    }

    /// Whether the entry has been recognized as deleted
    pub fn is_tombstone(&self) -> bool {
        matches!(self.slot, Slot::Absent { .. })
    }

    /// Whether a materialized value is present
    pub fn is_materialized(&self) -> bool {
        matches!(self.slot, Slot::Materialized { .. })
    }

    /// Replace the value, dropping any cached raw form
    pub(crate) fn set_value(&mut self, value: V) {
        self.slot = Slot::Materialized { value, raw: None };
    }

    /// Decode the raw bytes into a value, in place
    ///
    /// No-op unless the slot is still raw. Tombstone-recognized bytes move
    /// to the permanently absent state instead of producing a value.
    pub(crate) fn materialize<C: KeyCoder<K, V>>(&mut self, coder: &C) -> Result<()> {
        if let Slot::Raw(raw) = &self.slot {
            let raw = raw.clone();
            self.slot = if coder.is_tombstone(&raw) {
                Slot::Absent { raw }
            } else {
                let value = coder.value_decode(&raw)?;
                Slot::Materialized {
                    value,
                    raw: Some(raw),
                }
            };
        }
        Ok(())
    }
}
