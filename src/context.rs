//! Shared store context
//!
//! State the owning cache shares across all of its pages: the configuration,
//! the sample-rate counter driving the memory estimator, a monotonic logical
//! clock for recency stamps, and cheap always-on counters for pages encoded
//! and decoded. Everything here is explicit construction-time injection; the
//! page layer reads no ambient global state.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::PageConfig;

/// Per-store shared state injected into every page at construction
///
/// Typically wrapped in an `Arc` and cloned into each page the owning cache
/// creates.
#[derive(Debug)]
pub struct StoreContext {
    config: PageConfig,

    /// Shared sample-rate counter, bumped on every estimator update across
    /// all pages of the store
    estimate_counter: AtomicU64,

    /// Logical clock for page recency stamps
    clock: AtomicU64,

    // Always-on counters; the gated histograms live behind
    // `PageConfig::track_encoding_stats`.
    pages_encoded: AtomicU64,
    pages_decoded: AtomicU64,
}

impl StoreContext {
    /// Create a context with the given configuration
    pub fn new(config: PageConfig) -> Self {
        Self {
            config,
            estimate_counter: AtomicU64::new(0),
            clock: AtomicU64::new(0),
            pages_encoded: AtomicU64::new(0),
            pages_decoded: AtomicU64::new(0),
        }
    }

    /// The configuration shared by all pages of this store
    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    /// Next tick of the shared sample-rate counter
    pub(crate) fn next_estimate_tick(&self) -> u64 {
        self.estimate_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Next value of the monotonic logical clock
    pub fn next_timestamp(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_page_encoded(&self) {
        self.pages_encoded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_page_decoded(&self) {
        self.pages_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Total pages encoded through this context
    pub fn pages_encoded(&self) -> u64 {
        self.pages_encoded.load(Ordering::Relaxed)
    }

    /// Total pages decoded through this context
    pub fn pages_decoded(&self) -> u64 {
        self.pages_decoded.load(Ordering::Relaxed)
    }
}

impl Default for StoreContext {
    fn default() -> Self {
        Self::new(PageConfig::default())
    }
}
