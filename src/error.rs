//! Error types for pagestore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for pagestore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Page Format Errors
    // -------------------------------------------------------------------------
    /// The persisted bytes are corrupted or were written by an incompatible
    /// format. Recovery (re-fetch from another copy, fail the containing
    /// operation) is the caller's responsibility.
    #[error("page corruption detected: {0}")]
    PageCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    /// A misconfiguration the caller must fix; never retried (e.g. an
    /// unsupported compression codec id at encode time).
    #[error("configuration error: {0}")]
    Config(String),
}
