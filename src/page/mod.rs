//! Page Module
//!
//! Unit of storage covering one half-open key interval `[first_key,
//! next_first_key)` of an ordered, disk-backed key-value cache.
//!
//! ## Responsibilities
//! - Hold the interval's entries in strictly ascending key order
//! - Guard all mutable state behind one reader/writer lock per page
//! - Stamp every exclusive release for optimistic staleness detection
//! - Serialize to and from a compressed byte blob (see [`codec`] for the
//!   wire format)
//! - Track an approximate in-memory footprint to drive eviction ranking
//!   and the split policy
//!
//! ## Concurrency
//! Pages are independently lockable; there is no global lock. The entry
//! sequence, interval bound, state, and estimator are owned by whichever
//! thread holds the exclusive lock. The recency stamp is deliberately racy:
//! it ranks pages for eviction and never affects correctness.

mod codec;
mod entry;
mod estimate;
mod lock;

pub use entry::{PageEntry, Slot};
pub use lock::{LockMode, PageGuard, PageReadGuard, PageWriteGuard};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::coder::KeyCoder;
use crate::config::{PageConfig, DEFAULT_MAX_PAGE_ENTRIES};
use crate::context::StoreContext;
use crate::error::Result;
use estimate::MemoryEstimator;

// =============================================================================
// Page State
// =============================================================================

/// Synchronization status between the in-memory and persisted forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// The persisted blob matches the in-memory content
    DiskMemoryIdentical,

    /// In-memory changes have not been persisted; the owning structure
    /// must flush before evicting this page
    DiskMemoryDirty,
}

impl PageState {
    /// Whether a flush is owed before the page may be dropped
    pub fn is_transient(self) -> bool {
        matches!(self, PageState::DiskMemoryDirty)
    }
}

// =============================================================================
// Page
// =============================================================================

/// A page of the ordered store
///
/// `first_key` is immutable for the page's whole life; everything else that
/// matters for correctness lives behind the lock. Acquire shared access with
/// [`read_lock`](Self::read_lock) or exclusive access with
/// [`write_lock`](Self::write_lock); every exclusive release bumps the write
/// stamp by exactly one.
pub struct Page<K, V, C> {
    context: Arc<StoreContext>,
    coder: Arc<C>,

    /// Inclusive lower bound of the interval, set at construction
    first_key: K,

    inner: RwLock<PageInner<K, V>>,

    /// Incremented once per exclusive-access release; an optimistic
    /// staleness fingerprint readable without holding the lock
    write_stamp: AtomicU64,

    /// Approximate recency signal, updated opportunistically outside the
    /// lock; informs eviction ranking only
    time_stamp: AtomicU64,
}

impl<K, V, C> std::fmt::Debug for Page<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("write_stamp", &self.write_stamp.load(Ordering::Relaxed))
            .field("time_stamp", &self.time_stamp.load(Ordering::Relaxed))
            .finish()
    }
}

/// Lock-guarded portion of a page
pub(crate) struct PageInner<K, V> {
    /// Exclusive upper bound; `None` means unbounded (last page)
    pub(crate) next_first_key: Option<K>,

    /// Entries in strictly ascending key order, all inside the interval
    pub(crate) entries: Vec<PageEntry<K, V>>,

    pub(crate) state: PageState,
    pub(crate) estimator: MemoryEstimator,
}

impl<K, V> PageInner<K, V> {
    /// Whether `key` falls inside `[first_key, next_first_key)`
    ///
    /// Callers only query keys at or above `first_key`; that precondition
    /// is checked in debug builds and trusted in release builds.
    pub(crate) fn interval(&self, first_key: &K, key: &K) -> bool
    where
        K: Ord,
    {
        debug_assert!(key >= first_key);
        match &self.next_first_key {
            None => true,
            Some(next) => key < next,
        }
    }

    /// Whether the page has outgrown its budget and should be split
    ///
    /// A single-entry page never splits. The memory budget is consulted
    /// first, then the entry-count budget, then the global default count.
    pub(crate) fn split_condition(&self, config: &PageConfig) -> bool {
        let size = self.entries.len();
        if size == 1 {
            return false;
        }
        if let Some(max_mem) = config.max_page_memory {
            if max_mem > 0 && self.estimator.estimated_mem(size) > max_mem {
                return true;
            }
        }
        match config.max_page_entries {
            Some(max) if max > 0 => size > max,
            _ => size > DEFAULT_MAX_PAGE_ENTRIES,
        }
    }
}

impl<K, V, C> Page<K, V, C> {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create an empty page over `[first_key, next_first_key)`
    pub fn empty(
        context: Arc<StoreContext>,
        coder: Arc<C>,
        first_key: K,
        next_first_key: Option<K>,
    ) -> Self {
        let time_stamp = context.next_timestamp();
        Self {
            context,
            coder,
            first_key,
            inner: RwLock::new(PageInner {
                next_first_key,
                entries: Vec::new(),
                state: PageState::DiskMemoryIdentical,
                estimator: MemoryEstimator::default(),
            }),
            write_stamp: AtomicU64::new(0),
            time_stamp: AtomicU64::new(time_stamp),
        }
    }

    /// Create a page pre-populated with a slice of another page's entries,
    /// as produced by [`PageWriteGuard::split_entries`]
    ///
    /// The new page starts dirty: its entries have never been persisted
    /// under this interval.
    pub fn sibling(
        context: Arc<StoreContext>,
        coder: Arc<C>,
        first_key: K,
        next_first_key: Option<K>,
        entries: Vec<PageEntry<K, V>>,
    ) -> Self
    where
        K: Ord,
    {
        debug_assert!(entries.windows(2).all(|w| w[0].key() < w[1].key()));
        debug_assert!(entries.first().map_or(true, |e| e.key() >= &first_key));
        debug_assert!(match (&next_first_key, entries.last()) {
            (Some(next), Some(last)) => last.key() < next,
            _ => true,
        });

        let time_stamp = context.next_timestamp();
        Self {
            context,
            coder,
            first_key,
            inner: RwLock::new(PageInner {
                next_first_key,
                entries,
                state: PageState::DiskMemoryDirty,
                estimator: MemoryEstimator::default(),
            }),
            write_stamp: AtomicU64::new(0),
            time_stamp: AtomicU64::new(time_stamp),
        }
    }

    /// Load a page from a persisted blob
    ///
    /// `first_key` is the key the owning structure filed the blob under;
    /// debug builds check it against the encoded lower bound.
    pub fn from_blob(
        context: Arc<StoreContext>,
        coder: Arc<C>,
        first_key: K,
        blob: &[u8],
    ) -> Result<Self>
    where
        K: Ord,
        C: KeyCoder<K, V>,
    {
        let mut page = Self::empty(context, coder, first_key, None);
        codec::decode_inner(
            &page.context,
            page.coder.as_ref(),
            &page.first_key,
            page.inner.get_mut(),
            blob,
        )?;
        Ok(page)
    }

    /// In-memory size of a page before any entries land, for callers
    /// seeding their memory accounting with a per-page baseline
    pub fn baseline_footprint() -> usize {
        std::mem::size_of::<Self>()
    }

    // -------------------------------------------------------------------------
    // Unlocked accessors
    // -------------------------------------------------------------------------

    /// The immutable inclusive lower bound of the interval
    pub fn first_key(&self) -> &K {
        &self.first_key
    }

    /// The shared store context this page was created under
    pub fn context(&self) -> &StoreContext {
        &self.context
    }

    /// Current write stamp
    ///
    /// Strictly increases by one per exclusive release and never decreases.
    /// Comparing two observations tells whether an exclusive mutation
    /// happened in between, without holding the lock continuously.
    pub fn write_stamp(&self) -> u64 {
        self.write_stamp.load(Ordering::Acquire)
    }

    /// Last recency stamp recorded by [`touch`](Self::touch)
    pub fn time_stamp(&self) -> u64 {
        self.time_stamp.load(Ordering::Relaxed)
    }

    /// Refresh the recency stamp from the context's clock
    ///
    /// Unordered with respect to the page lock; the race is acceptable
    /// because the stamp only ranks pages for eviction.
    pub fn touch(&self) {
        self.time_stamp
            .store(self.context.next_timestamp(), Ordering::Relaxed);
    }

    // -------------------------------------------------------------------------
    // Locking
    // -------------------------------------------------------------------------

    /// Acquire shared access, blocking while a writer holds the page
    ///
    /// Acquisition is recursive: a thread already holding shared access
    /// never deadlocks behind a queued writer when it re-acquires.
    pub fn read_lock(&self) -> PageReadGuard<'_, K, V, C> {
        PageReadGuard {
            page: self,
            inner: self.inner.read_recursive(),
        }
    }

    /// Acquire exclusive access, blocking until all other holders release
    pub fn write_lock(&self) -> PageWriteGuard<'_, K, V, C> {
        PageWriteGuard {
            page: self,
            inner: Some(self.inner.write()),
        }
    }

    /// Attempt exclusive access without blocking
    ///
    /// Returns `None` under contention so the owning structure can back
    /// off (skip a busy page during an eviction sweep) rather than stall.
    pub fn try_write_lock(&self) -> Option<PageWriteGuard<'_, K, V, C>> {
        self.inner.try_write().map(|guard| PageWriteGuard {
            page: self,
            inner: Some(guard),
        })
    }

    /// Acquire in the given mode; releasing is dropping the guard
    pub fn mode_lock(&self, mode: LockMode) -> PageGuard<'_, K, V, C> {
        match mode {
            LockMode::Read => PageGuard::Read(self.read_lock()),
            LockMode::Write => PageGuard::Write(self.write_lock()),
        }
    }
}
