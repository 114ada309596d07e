//! Configuration for pagestore
//!
//! Centralized configuration with sensible defaults. Everything the original
//! system read from process-wide properties at startup is an explicit field
//! here, injected at construction time.

use crate::compress::Codec;

/// Fallback entry-count threshold for [`split_condition`] when neither
/// `max_page_memory` nor `max_page_entries` is configured.
///
/// [`split_condition`]: crate::page::PageReadGuard::split_condition
pub const DEFAULT_MAX_PAGE_ENTRIES: usize = 50;

/// How an entry's in-memory size is measured when a sample is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationStrategy {
    /// Sum of the key's and value's serialized byte lengths — a cheap proxy
    EncodedBytes,

    /// The coder's reported memory footprint of the key and value objects
    /// (defaults to the encoded length unless the coder overrides it)
    DeepSize,
}

/// Main configuration for the page layer
#[derive(Debug, Clone)]
pub struct PageConfig {
    // -------------------------------------------------------------------------
    // Compression Configuration
    // -------------------------------------------------------------------------
    /// Codec applied to every newly encoded page. Pages written under a
    /// different codec remain readable: decode always follows the codec id
    /// persisted in the blob itself.
    pub codec: Codec,

    /// Compression level for the deflate/gzip codecs (ignored by the rest)
    pub codec_level: u32,

    /// Initial capacity of the encode output buffer (in bytes)
    pub buffer_size: usize,

    // -------------------------------------------------------------------------
    // Memory Estimation Configuration
    // -------------------------------------------------------------------------
    /// Measurement strategy used when a sample is taken
    pub estimation_strategy: EstimationStrategy,

    /// Multiplier applied to raw decoded byte counts when a page carries no
    /// estimate trailer, biasing the average toward caution until genuine
    /// samples accumulate
    pub missing_estimate_inflation_factor: u64,

    /// Lower bound of the averaging window before history is collapsed
    pub sampling_roll_min: u64,

    /// Per-entry scale of the averaging window before history is collapsed
    pub sampling_roll_factor: u64,

    /// Sampling cadence: a sample is taken every Nth write across all pages
    /// sharing the counter. `0` switches to the per-page mode where the
    /// cadence follows the page's own accumulated sample count.
    pub sampling_interval: u64,

    // -------------------------------------------------------------------------
    // Split Policy Configuration
    // -------------------------------------------------------------------------
    /// Memory budget per page; a page whose estimate exceeds it should split
    pub max_page_memory: Option<u64>,

    /// Entry-count budget per page; checked after the memory budget.
    /// When unset, [`DEFAULT_MAX_PAGE_ENTRIES`] applies.
    pub max_page_entries: Option<usize>,

    // -------------------------------------------------------------------------
    // Observability Configuration
    // -------------------------------------------------------------------------
    /// Record per-field encoded-size histograms during encode/decode.
    /// Correctness never depends on this being on (or on any recorder
    /// being installed).
    pub track_encoding_stats: bool,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            codec: Codec::Deflate,
            codec_level: 1,
            buffer_size: 1024,
            estimation_strategy: EstimationStrategy::DeepSize,
            missing_estimate_inflation_factor: 8,
            sampling_roll_min: 1000,
            sampling_roll_factor: 100,
            sampling_interval: 0,
            max_page_memory: None,
            max_page_entries: None,
            track_encoding_stats: false,
        }
    }
}

impl PageConfig {
    /// Create a new config builder
    pub fn builder() -> PageConfigBuilder {
        PageConfigBuilder::default()
    }
}

/// Builder for PageConfig
#[derive(Default)]
pub struct PageConfigBuilder {
    config: PageConfig,
}

impl PageConfigBuilder {
    /// Set the compression codec for newly encoded pages
    pub fn codec(mut self, codec: Codec) -> Self {
        self.config.codec = codec;
        self
    }

    /// Set the compression level (deflate/gzip only)
    pub fn codec_level(mut self, level: u32) -> Self {
        self.config.codec_level = level;
        self
    }

    /// Set the initial encode buffer capacity (in bytes)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Set the memory estimation strategy
    pub fn estimation_strategy(mut self, strategy: EstimationStrategy) -> Self {
        self.config.estimation_strategy = strategy;
        self
    }

    /// Set the inflation factor for pages persisted without an estimate trailer
    pub fn missing_estimate_inflation_factor(mut self, factor: u64) -> Self {
        self.config.missing_estimate_inflation_factor = factor;
        self
    }

    /// Set the lower bound of the estimator's averaging window
    pub fn sampling_roll_min(mut self, min: u64) -> Self {
        self.config.sampling_roll_min = min;
        self
    }

    /// Set the per-entry scale of the estimator's averaging window
    pub fn sampling_roll_factor(mut self, factor: u64) -> Self {
        self.config.sampling_roll_factor = factor;
        self
    }

    /// Set the sampling cadence (0 = per-page mode)
    pub fn sampling_interval(mut self, interval: u64) -> Self {
        self.config.sampling_interval = interval;
        self
    }

    /// Set the per-page memory budget for the split policy
    pub fn max_page_memory(mut self, bytes: u64) -> Self {
        self.config.max_page_memory = Some(bytes);
        self
    }

    /// Set the per-page entry-count budget for the split policy
    pub fn max_page_entries(mut self, entries: usize) -> Self {
        self.config.max_page_entries = Some(entries);
        self
    }

    /// Enable encoded-size histogram recording
    pub fn track_encoding_stats(mut self, enabled: bool) -> Self {
        self.config.track_encoding_stats = enabled;
        self
    }

    pub fn build(self) -> PageConfig {
        self.config
    }
}
