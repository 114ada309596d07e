//! Compression codecs for the page blob format
//!
//! Stateless byte-buffer transforms selected by a small integer id. The id is
//! persisted in each page's flags byte, so a store written under several
//! codec configurations over time stays fully readable: decode picks the
//! inverse transform from the blob itself, never from the current default.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::error::{Result, StoreError};

/// Compression codec applied to the page body
///
/// The discriminants are the on-disk codec ids and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// No transform (id 0)
    None,
    /// Zlib/deflate stream (id 1)
    Deflate,
    /// Gzip stream (id 2)
    Gzip,
    /// LZ4 block with prepended size (id 3)
    Lz4,
    /// Snappy block (id 4)
    Snappy,
}

impl Codec {
    /// The on-disk id stored in the low 4 bits of the page flags byte
    pub fn id(self) -> u8 {
        match self {
            Codec::None => 0,
            Codec::Deflate => 1,
            Codec::Gzip => 2,
            Codec::Lz4 => 3,
            Codec::Snappy => 4,
        }
    }

    /// Look up a codec by its on-disk id
    ///
    /// Returns `None` for ids this build does not know, which a caller
    /// reading a persisted page must treat as a corrupted-or-incompatible
    /// blob.
    pub fn from_id(id: u8) -> Option<Codec> {
        match id {
            0 => Some(Codec::None),
            1 => Some(Codec::Deflate),
            2 => Some(Codec::Gzip),
            3 => Some(Codec::Lz4),
            4 => Some(Codec::Snappy),
            _ => None,
        }
    }
}

/// Compress a buffer with the given codec
///
/// `level` applies to the deflate/gzip streams and is ignored by the rest.
/// An out-of-range level is a configuration error the caller must fix, not
/// a condition to retry.
pub fn compress(data: &[u8], codec: Codec, level: u32) -> Result<Vec<u8>> {
    if level > 9 && matches!(codec, Codec::Deflate | Codec::Gzip) {
        return Err(StoreError::Config(format!(
            "compression level {} out of range (0-9)",
            level
        )));
    }
    match codec {
        Codec::None => Ok(data.to_vec()),
        Codec::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        Codec::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        Codec::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        Codec::Snappy => snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| StoreError::Serialization(format!("snappy compression failed: {}", e))),
    }
}

/// Decompress a buffer with the given codec
///
/// Any failure of the underlying stream is reported as a page corruption:
/// the bytes do not decode under the codec they claim to be written with.
pub fn decompress(data: &[u8], codec: Codec) -> Result<Vec<u8>> {
    match codec {
        Codec::None => Ok(data.to_vec()),
        Codec::Deflate => {
            let mut out = Vec::new();
            ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| corrupt("deflate", e))?;
            Ok(out)
        }
        Codec::Gzip => {
            let mut out = Vec::new();
            GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| corrupt("gzip", e))?;
            Ok(out)
        }
        Codec::Lz4 => lz4_flex::decompress_size_prepended(data).map_err(|e| corrupt("lz4", e)),
        Codec::Snappy => snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| corrupt("snappy", e)),
    }
}

fn corrupt(codec: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::PageCorruption(format!("{} stream decode failed: {}", codec, err))
}
