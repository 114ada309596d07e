//! # pagestore
//!
//! Page-level storage layer for an ordered, disk-backed key-value cache:
//! - Pages own contiguous, half-open key intervals
//! - Reentrant read/write locking with an optimistic write-stamp protocol
//! - Compressed binary blob format with four interchangeable codecs
//! - Running-average memory estimation to drive eviction and splitting
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Owning Cache / Index                         │
//! │      (skip list, split points, flush & eviction)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ lock / read / write / split?
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Page                                  │
//! │      (RwLock + write stamp + interval + entries)             │
//! └───────┬──────────────────┬──────────────────┬───────────────┘
//!         │                  │                  │
//!         ▼                  ▼                  ▼
//!  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//!  │  KeyCoder   │    │  Estimator  │    │  Blob Codec │
//!  │ (K/V bytes) │    │ (sampling)  │    │ (compress)  │
//!  └─────────────┘    └─────────────┘    └─────────────┘
//! ```
//!
//! The owning structure acquires a page's lock, reads and writes entries
//! through the guards, asks [`split_condition`] whether to divide the page,
//! and persists it through [`encode`]/[`Page::from_blob`] while consulting
//! the memory estimate for eviction ranking.
//!
//! [`split_condition`]: page::PageReadGuard::split_condition
//! [`encode`]: page::PageReadGuard::encode

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod coder;
pub mod compress;
pub mod context;
pub mod page;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::{EstimationStrategy, PageConfig, PageConfigBuilder, DEFAULT_MAX_PAGE_ENTRIES};
pub use coder::{BincodeCoder, KeyCoder};
pub use compress::Codec;
pub use context::StoreContext;
pub use page::{
    LockMode, Page, PageEntry, PageGuard, PageReadGuard, PageState, PageWriteGuard, Slot,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of pagestore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
