//! Locking and versioning protocol
//!
//! Scoped guards over the page's reader/writer lock. A guard releases on
//! every exit path, including panic unwinding, and the exclusive guard bumps
//! the page's write stamp by exactly one on release — the stamp is the
//! optimistic-concurrency fingerprint external callers compare across their
//! own lock-free gaps.

use std::sync::atomic::Ordering;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::coder::KeyCoder;
use crate::error::Result;

use super::{codec, Page, PageEntry, PageInner, PageState};

/// Two-valued access-mode tag for mode-dispatched acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

// =============================================================================
// Read Guard
// =============================================================================

/// Shared access to a page; any number may exist concurrently
pub struct PageReadGuard<'a, K, V, C> {
    pub(super) page: &'a Page<K, V, C>,
    pub(super) inner: RwLockReadGuard<'a, PageInner<K, V>>,
}

impl<'a, K, V, C> PageReadGuard<'a, K, V, C> {
    /// Number of entries in the page
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// The exclusive upper bound, `None` when unbounded
    pub fn next_first_key(&self) -> Option<&K> {
        self.inner.next_first_key.as_ref()
    }

    pub fn entry(&self, index: usize) -> &PageEntry<K, V> {
        &self.inner.entries[index]
    }

    pub fn key(&self, index: usize) -> &K {
        self.inner.entries[index].key()
    }

    /// The materialized value at `index`, if any
    pub fn value(&self, index: usize) -> Option<&V> {
        self.inner.entries[index].value()
    }

    pub fn state(&self) -> PageState {
        self.inner.state
    }

    /// Whether a flush is owed before eviction
    pub fn is_transient(&self) -> bool {
        self.inner.state.is_transient()
    }

    /// Whether `key` falls inside this page's interval
    pub fn interval(&self, key: &K) -> bool
    where
        K: Ord,
    {
        self.inner.interval(&self.page.first_key, key)
    }

    /// Binary search for `key` among the page's entries
    pub fn search(&self, key: &K) -> std::result::Result<usize, usize>
    where
        K: Ord,
    {
        self.inner.entries.binary_search_by(|e| e.key().cmp(key))
    }

    /// Cached memory estimate from the last refresh
    pub fn memory_estimate(&self) -> u64 {
        self.inner.estimator.memory_estimate()
    }

    /// Freshly computed memory estimate
    pub fn estimated_mem(&self) -> u64 {
        self.inner.estimator.estimated_mem(self.inner.entries.len())
    }

    /// Running average entry size from the sampler
    pub fn avg_entry_size(&self) -> u64 {
        self.inner.estimator.avg_entry_size()
    }

    /// Whether the page should be split (see the split policy)
    pub fn split_condition(&self) -> bool {
        self.inner.split_condition(self.page.context.config())
    }

    /// Serialize the page to a compressed blob
    pub fn encode(&self) -> Result<Vec<u8>>
    where
        C: KeyCoder<K, V>,
    {
        self.encode_recorded(true)
    }

    /// Serialize, with per-call control over histogram recording
    ///
    /// Callers measuring a hypothetical encoding pass `false` so the
    /// throwaway blob does not skew the observability data.
    pub fn encode_recorded(&self, record: bool) -> Result<Vec<u8>>
    where
        C: KeyCoder<K, V>,
    {
        codec::encode_inner(
            &self.page.context,
            self.page.coder.as_ref(),
            &self.page.first_key,
            &self.inner,
            record,
        )
    }

    /// Trade shared for exclusive access and report stamp stability
    ///
    /// The release-then-acquire is not atomic: another writer may slip in
    /// between. A `false` result means read-time assumptions about the
    /// page's contents may be stale and must be re-validated or retried.
    pub fn upgrade_and_test_stamp(self, old_stamp: u64) -> (PageWriteGuard<'a, K, V, C>, bool) {
        let page = self.page;
        drop(self.inner);
        let guard = page.write_lock();
        let unchanged = page.write_stamp() == old_stamp;
        (guard, unchanged)
    }
}

// =============================================================================
// Write Guard
// =============================================================================

/// Exclusive access to a page; at most one exists at a time
///
/// Dropping the guard releases the lock and bumps the write stamp, on every
/// exit path.
pub struct PageWriteGuard<'a, K, V, C> {
    pub(super) page: &'a Page<K, V, C>,
    pub(super) inner: Option<RwLockWriteGuard<'a, PageInner<K, V>>>,
}

impl<'a, K, V, C> PageWriteGuard<'a, K, V, C> {
    fn inner(&self) -> &PageInner<K, V> {
        self.inner
            .as_deref()
            .expect("write guard accessed after release")
    }

    fn inner_mut(&mut self) -> &mut PageInner<K, V> {
        self.inner
            .as_deref_mut()
            .expect("write guard accessed after release")
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().entries.is_empty()
    }

    pub fn next_first_key(&self) -> Option<&K> {
        self.inner().next_first_key.as_ref()
    }

    pub fn entry(&self, index: usize) -> &PageEntry<K, V> {
        &self.inner().entries[index]
    }

    pub fn key(&self, index: usize) -> &K {
        self.inner().entries[index].key()
    }

    pub fn value(&self, index: usize) -> Option<&V> {
        self.inner().entries[index].value()
    }

    pub fn state(&self) -> PageState {
        self.inner().state
    }

    pub fn is_transient(&self) -> bool {
        self.inner().state.is_transient()
    }

    pub fn interval(&self, key: &K) -> bool
    where
        K: Ord,
    {
        self.inner().interval(&self.page.first_key, key)
    }

    pub fn search(&self, key: &K) -> std::result::Result<usize, usize>
    where
        K: Ord,
    {
        self.inner().entries.binary_search_by(|e| e.key().cmp(key))
    }

    pub fn memory_estimate(&self) -> u64 {
        self.inner().estimator.memory_estimate()
    }

    pub fn estimated_mem(&self) -> u64 {
        let inner = self.inner();
        inner.estimator.estimated_mem(inner.entries.len())
    }

    pub fn avg_entry_size(&self) -> u64 {
        self.inner().estimator.avg_entry_size()
    }

    pub fn split_condition(&self) -> bool {
        self.inner().split_condition(self.page.context.config())
    }

    pub fn encode(&self) -> Result<Vec<u8>>
    where
        C: KeyCoder<K, V>,
    {
        self.encode_recorded(true)
    }

    pub fn encode_recorded(&self, record: bool) -> Result<Vec<u8>>
    where
        C: KeyCoder<K, V>,
    {
        codec::encode_inner(
            &self.page.context,
            self.page.coder.as_ref(),
            &self.page.first_key,
            self.inner(),
            record,
        )
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Overwrite the synchronization state
    ///
    /// The owning structure calls this with
    /// [`PageState::DiskMemoryIdentical`] after a successful flush.
    pub fn set_state(&mut self, state: PageState) {
        self.inner_mut().state = state;
    }

    /// Re-link the exclusive upper bound, e.g. after a split
    pub fn set_next_first_key(&mut self, next_first_key: Option<K>) {
        let inner = self.inner_mut();
        inner.next_first_key = next_first_key;
        inner.state = PageState::DiskMemoryDirty;
    }

    /// Insert a new entry at `index`, keeping keys strictly ascending
    ///
    /// The position comes from a prior [`search`](Self::search) miss;
    /// ordering against the neighbors is checked in debug builds.
    pub fn insert_at(&mut self, index: usize, key: K, value: V) -> Result<()>
    where
        K: Ord,
        C: KeyCoder<K, V>,
    {
        debug_assert!(index == 0 || self.inner().entries[index - 1].key() < &key);
        debug_assert!(
            index == self.inner().entries.len() || &key < self.inner().entries[index].key()
        );

        self.update_average(&key, &value, 1)?;
        let inner = self.inner_mut();
        inner.entries.insert(index, PageEntry::new(key, value));
        inner.state = PageState::DiskMemoryDirty;
        Ok(())
    }

    /// Replace the value of the entry at `index`
    pub fn update_at(&mut self, index: usize, value: V) -> Result<()>
    where
        C: KeyCoder<K, V>,
    {
        let page = self.page;
        let inner = self.inner_mut();
        let size = inner.entries.len();
        let PageInner {
            entries,
            estimator,
            state,
            ..
        } = inner;
        estimator.update_sampled(
            &page.context,
            page.coder.as_ref(),
            entries[index].key(),
            &value,
            1,
            size,
        )?;
        entries[index].set_value(value);
        *state = PageState::DiskMemoryDirty;
        Ok(())
    }

    /// Remove and return the entry at `index`
    pub fn remove_at(&mut self, index: usize) -> PageEntry<K, V> {
        let inner = self.inner_mut();
        let entry = inner.entries.remove(index);
        inner.state = PageState::DiskMemoryDirty;
        entry
    }

    /// Drain the entries from `at` upward for sibling construction
    ///
    /// The caller builds the sibling with [`Page::sibling`] and re-links
    /// both pages' bounds; cross-page lock ordering is the caller's job.
    pub fn split_entries(&mut self, at: usize) -> Vec<PageEntry<K, V>> {
        let inner = self.inner_mut();
        let upper = inner.entries.split_off(at);
        inner.state = PageState::DiskMemoryDirty;
        upper
    }

    /// Materialize the value at `index` from its raw bytes
    ///
    /// Tombstone-recognized raw bytes leave the value permanently absent,
    /// and the returned option is `None` for them.
    pub fn fetch_value(&mut self, index: usize) -> Result<Option<&V>>
    where
        C: KeyCoder<K, V>,
    {
        let page = self.page;
        let inner = self.inner_mut();
        inner.entries[index].materialize(page.coder.as_ref())?;
        Ok(inner.entries[index].value())
    }

    /// Feed one write into the sampled running average
    pub fn update_average(&mut self, key: &K, value: &V, count: u64) -> Result<()>
    where
        C: KeyCoder<K, V>,
    {
        let page = self.page;
        let inner = self.inner_mut();
        let size = inner.entries.len();
        inner
            .estimator
            .update_sampled(&page.context, page.coder.as_ref(), key, value, count, size)
    }

    /// Restore estimator state from a persisted trailer
    pub fn set_average(&mut self, total: u64, count: u64) {
        self.inner_mut().estimator.set_average(total, count);
    }

    /// Recompute and cache the memory estimate
    pub fn update_memory_estimate(&mut self) {
        let inner = self.inner_mut();
        let size = inner.entries.len();
        inner.estimator.update_memory_estimate(size);
    }

    /// Repopulate this page from a persisted blob
    pub fn decode(&mut self, blob: &[u8]) -> Result<()>
    where
        K: Ord,
        C: KeyCoder<K, V>,
    {
        let page = self.page;
        codec::decode_inner(
            &page.context,
            page.coder.as_ref(),
            &page.first_key,
            self.inner_mut(),
            blob,
        )
    }

    /// Trade exclusive for shared access with no lock-free gap
    ///
    /// Still counts as an exclusive release: the write stamp is bumped.
    pub fn downgrade(mut self) -> PageReadGuard<'a, K, V, C> {
        let page = self.page;
        let guard = self
            .inner
            .take()
            .expect("write guard accessed after release");
        page.write_stamp.fetch_add(1, Ordering::Release);
        let inner = RwLockWriteGuard::downgrade(guard);
        PageReadGuard { page, inner }
    }
}

impl<K, V, C> Drop for PageWriteGuard<'_, K, V, C> {
    fn drop(&mut self) {
        if let Some(guard) = self.inner.take() {
            // Bump before the lock is released so the next holder observes it.
            self.page.write_stamp.fetch_add(1, Ordering::Release);
            drop(guard);
        }
    }
}

// =============================================================================
// Mode-dispatched Guard
// =============================================================================

/// A guard acquired through [`Page::mode_lock`]; dropping it is the
/// mode-dispatched unlock (the write side bumps the stamp as always)
pub enum PageGuard<'a, K, V, C> {
    Read(PageReadGuard<'a, K, V, C>),
    Write(PageWriteGuard<'a, K, V, C>),
}

impl<'a, K, V, C> PageGuard<'a, K, V, C> {
    /// The mode this guard was acquired in
    pub fn mode(&self) -> LockMode {
        match self {
            PageGuard::Read(_) => LockMode::Read,
            PageGuard::Write(_) => LockMode::Write,
        }
    }
}
