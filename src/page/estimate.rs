//! Running-average memory estimator
//!
//! Approximates a page's heap footprint without measuring every entry on
//! every write. Samples are taken on a cadence driven by the store-wide
//! counter, folded into a running average whose window is bounded so recent
//! writes dominate as the page's size changes.

use crate::coder::KeyCoder;
use crate::config::{EstimationStrategy, PageConfig};
use crate::context::StoreContext;
use crate::error::Result;

/// Fixed per-entry overhead added on top of the sampled average: three
/// reference-sized bookkeeping slots (key, value, raw form) at 4 bytes each.
pub(crate) const ENTRY_OVERHEAD: u64 = 12;

/// Estimator state embedded in every page
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MemoryEstimator {
    avg_entry_size: u64,
    estimates: u64,
    estimate_total: u64,

    /// Cached result of [`estimated_mem`](Self::estimated_mem), refreshed
    /// on demand so an eviction sweep can read it repeatedly for free
    memory_estimate: u64,
}

impl MemoryEstimator {
    /// Take a sample for one write if the cadence says so
    ///
    /// The shared counter ticks on every call. A sample is measured only
    /// when no average exists yet, or when the configured periodicity is
    /// hit: every Nth store-wide write when `sampling_interval > 0`, every
    /// Nth write relative to this page's own sample count otherwise.
    pub(crate) fn update_sampled<K, V, C: KeyCoder<K, V>>(
        &mut self,
        ctx: &StoreContext,
        coder: &C,
        key: &K,
        value: &V,
        count: u64,
        size: usize,
    ) -> Result<()> {
        let config = ctx.config();
        let tick = ctx.next_estimate_tick();
        let interval = config.sampling_interval;

        let due = self.avg_entry_size == 0
            || (interval == 0 && self.estimates > 0 && tick % self.estimates == 0)
            || (interval > 0 && tick % interval == 0);
        if !due {
            return Ok(());
        }

        let byte_count = match config.estimation_strategy {
            EstimationStrategy::EncodedBytes => {
                (coder.key_encode(key)?.len() + coder.value_encode(value)?.len()) as u64
            }
            EstimationStrategy::DeepSize => {
                coder.key_mem_estimate(key)? + coder.value_mem_estimate(value)?
            }
        };
        self.fold(byte_count, count, size, config);
        Ok(())
    }

    /// Fold one `(byte_count, entry_count)` sample into the running average
    ///
    /// When the accumulated sample count outgrows
    /// `min(sampling_roll_min, size * sampling_roll_factor)`, history is
    /// collapsed to its current average before the new sample lands.
    pub(crate) fn fold(&mut self, byte_count: u64, count: u64, size: usize, config: &PageConfig) {
        debug_assert!(byte_count > 0);
        debug_assert!(count > 0);

        let window = config
            .sampling_roll_min
            .min(size as u64 * config.sampling_roll_factor);
        if self.estimates > window {
            self.estimate_total = self.avg_entry_size;
            self.estimates = 1;
        }
        self.estimates += count;
        self.estimate_total += byte_count * count;
        self.avg_entry_size = self.estimate_total / self.estimates;
    }

    /// Restore state from a persisted trailer
    ///
    /// The `(1, 1)` pair is the no-sample-data sentinel and resets the
    /// estimator to a zeroed average, as does a zero count.
    pub(crate) fn set_average(&mut self, total: u64, count: u64) {
        if count == 0 || (total == 1 && count == 1) {
            self.avg_entry_size = 0;
            self.estimates = 0;
            self.estimate_total = 0;
        } else {
            self.avg_entry_size = total / count;
            self.estimates = count;
            self.estimate_total = total;
        }
    }

    /// Current footprint estimate for a page of `size` entries
    pub(crate) fn estimated_mem(&self, size: usize) -> u64 {
        (self.avg_entry_size + ENTRY_OVERHEAD) * size as u64
    }

    /// Recompute and cache [`estimated_mem`](Self::estimated_mem)
    pub(crate) fn update_memory_estimate(&mut self, size: usize) {
        self.memory_estimate = self.estimated_mem(size);
    }

    /// The cached estimate from the last refresh
    pub(crate) fn memory_estimate(&self) -> u64 {
        self.memory_estimate
    }

    pub(crate) fn avg_entry_size(&self) -> u64 {
        self.avg_entry_size
    }

    pub(crate) fn estimates(&self) -> u64 {
        self.estimates
    }

    pub(crate) fn estimate_total(&self) -> u64 {
        self.estimate_total
    }
}
