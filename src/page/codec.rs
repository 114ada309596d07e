//! Page wire format
//!
//! Encoding and decoding between a page's in-memory form and its persisted
//! blob. The layout is stable across codec choices.
//!
//! ## Blob Format
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Flags (1 byte, uncompressed)                              │
//! │   low 4 bits: codec id | bit 4: estimate trailer present  │
//! ├───────────────────────────────────────────────────────────┤
//! │ Body (passed through the codec selected by the flags)     │
//! │   EntryCount: varint                                      │
//! │   FirstKey:     [Len: varint][bytes]                      │
//! │   NextFirstKey: [Len: varint][bytes] (len 0 = unbounded)  │
//! │   Entries: [KeyLen][key][ValLen][raw value]               │
//! │   ... repeated EntryCount times, in key order ...         │
//! │   Trailer: EstimateTotal: varint | Estimates: varint      │
//! │   ((1,1) = no real sample data)                           │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Newly written blobs always carry the trailer; decode still accepts
//! older blobs without one and synthesizes a conservative estimate in
//! their place.

use std::borrow::Cow;

use bytes::Bytes;

use crate::coder::KeyCoder;
use crate::compress::{compress, decompress, Codec};
use crate::context::StoreContext;
use crate::error::{Result, StoreError};

use super::entry::Slot;
use super::{PageEntry, PageInner, PageState};

/// Bit 4 of the flags byte: estimate trailer present
const FLAG_HAS_ESTIMATES: u8 = 1 << 4;

/// Low 4 bits of the flags byte: compression codec id
const CODEC_ID_MASK: u8 = 0x0f;

// =============================================================================
// Encode
// =============================================================================

pub(super) fn encode_inner<K, V, C: KeyCoder<K, V>>(
    ctx: &StoreContext,
    coder: &C,
    first_key: &K,
    inner: &PageInner<K, V>,
    record: bool,
) -> Result<Vec<u8>> {
    ctx.record_page_encoded();
    let config = ctx.config();
    let stats = config.track_encoding_stats && record;
    let size = inner.entries.len();

    let mut body = Vec::with_capacity(config.buffer_size);
    write_varint(&mut body, size as u64);

    let first_key_encoded = coder.key_encode(first_key)?;
    debug_assert!(!first_key_encoded.is_empty());
    let next_first_key_encoded = match &inner.next_first_key {
        Some(key) => coder.key_encode(key)?,
        // The zero-length encoding is the reserved unbounded marker.
        None => Vec::new(),
    };
    if stats {
        metrics::histogram!("pagestore_encode_first_key_bytes")
            .record(first_key_encoded.len() as f64);
        metrics::histogram!("pagestore_encode_next_first_key_bytes")
            .record(next_first_key_encoded.len() as f64);
    }
    write_bytes(&mut body, &first_key_encoded);
    write_bytes(&mut body, &next_first_key_encoded);

    for entry in &inner.entries {
        let key_encoded = coder.key_encode(entry.key())?;
        debug_assert!(!key_encoded.is_empty());
        let raw: Cow<'_, [u8]> = match entry.slot() {
            Slot::Raw(raw) | Slot::Absent { raw } => Cow::Borrowed(raw.as_ref()),
            Slot::Materialized {
                raw: Some(raw), ..
            } => Cow::Borrowed(raw.as_ref()),
            Slot::Materialized { value, raw: None } => Cow::Owned(coder.value_encode(value)?),
        };
        if stats {
            metrics::histogram!("pagestore_encode_key_bytes").record(key_encoded.len() as f64);
            metrics::histogram!("pagestore_encode_value_bytes").record(raw.len() as f64);
        }
        write_bytes(&mut body, &key_encoded);
        write_bytes(&mut body, &raw);
    }

    // A page with no samples persists the (1,1) sentinel rather than zeros.
    write_varint(&mut body, inner.estimator.estimate_total().max(1));
    write_varint(&mut body, inner.estimator.estimates().max(1));

    let compressed = compress(&body, config.codec, config.codec_level)?;
    let mut blob = Vec::with_capacity(1 + compressed.len());
    blob.push(config.codec.id() | FLAG_HAS_ESTIMATES);
    blob.extend_from_slice(&compressed);

    if stats {
        metrics::histogram!("pagestore_encode_entries_per_page").record(size as f64);
        metrics::histogram!("pagestore_encode_page_bytes").record(blob.len() as f64);
    }
    tracing::trace!(
        "Encoded page: {} entries, {} -> {} bytes ({:?})",
        size,
        body.len(),
        blob.len(),
        config.codec
    );
    Ok(blob)
}

// =============================================================================
// Decode
// =============================================================================

pub(super) fn decode_inner<K: Ord, V, C: KeyCoder<K, V>>(
    ctx: &StoreContext,
    coder: &C,
    first_key: &K,
    inner: &mut PageInner<K, V>,
    blob: &[u8],
) -> Result<()> {
    ctx.record_page_decoded();

    let mut reader = ByteReader::new(blob);
    let flags = reader.read_u8("page flags")?;
    let codec_id = flags & CODEC_ID_MASK;
    let has_estimates = flags & FLAG_HAS_ESTIMATES != 0;
    // Strictly the persisted id, never the configured default.
    let codec = Codec::from_id(codec_id).ok_or_else(|| {
        StoreError::PageCorruption(format!("unknown compression codec id {}", codec_id))
    })?;
    let body = decompress(reader.remaining(), codec)?;

    let mut reader = ByteReader::new(&body);
    let count = reader.read_varint("entry count")? as usize;
    if count > body.len() {
        return Err(StoreError::PageCorruption(format!(
            "entry count {} exceeds page body of {} bytes",
            count,
            body.len()
        )));
    }

    let decoded_first_key = coder.key_decode(reader.read_bytes("first key")?)?;
    debug_assert!(decoded_first_key == *first_key);

    let next_first_key_bytes = reader.read_bytes("next first key")?;
    let next_first_key = if next_first_key_bytes.is_empty() {
        None
    } else {
        Some(coder.key_decode(next_first_key_bytes)?)
    };

    let mut entries = Vec::with_capacity(count);
    let mut bytes_read = 0u64;
    for _ in 0..count {
        let key_bytes = reader.read_bytes("entry key")?;
        let value_bytes = reader.read_bytes("entry value")?;
        bytes_read += (key_bytes.len() + value_bytes.len()) as u64;
        let key = coder.key_decode(key_bytes)?;
        entries.push(PageEntry::from_raw(key, Bytes::copy_from_slice(value_bytes)));
    }
    debug_assert!(entries.windows(2).all(|w| w[0].key() < w[1].key()));

    if has_estimates {
        let total = reader.read_varint("estimate total")?;
        let estimates = reader.read_varint("estimate count")?;
        inner.estimator.set_average(total, estimates);
    } else {
        // Older blobs carry no trailer; bias the average toward caution
        // until genuine samples accumulate.
        inner.estimator.set_average(
            bytes_read * ctx.config().missing_estimate_inflation_factor,
            count as u64,
        );
    }

    inner.entries = entries;
    inner.next_first_key = next_first_key;
    inner.estimator.update_memory_estimate(count);
    inner.state = PageState::DiskMemoryIdentical;

    tracing::trace!(
        "Decoded page: {} entries from {} bytes ({:?})",
        count,
        blob.len(),
        codec
    );
    Ok(())
}

// =============================================================================
// Varint / length-prefix primitives
// =============================================================================

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn truncated(what: &str) -> StoreError {
    StoreError::PageCorruption(format!("truncated {}: expected 1 byte, got 0", what))
}

/// Cursor over a decoded page body
struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_u8(&mut self, what: &str) -> Result<u8> {
        let byte = *self.buf.get(self.pos).ok_or_else(|| truncated(what))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_varint(&mut self, what: &str) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            if shift >= 64 {
                return Err(StoreError::PageCorruption(format!(
                    "varint overflow reading {}",
                    what
                )));
            }
            let byte = self.read_u8(what)?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn read_bytes(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.read_varint(what)? as usize;
        let available = self.buf.len() - self.pos;
        if len > available {
            return Err(StoreError::PageCorruption(format!(
                "truncated {}: expected {} bytes, got {}",
                what, len, available
            )));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}
