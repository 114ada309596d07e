//! Tests for the split policy
//!
//! These tests verify the priority order of the thresholds: single-entry
//! pages never split; then the memory budget, then the entry-count budget,
//! then the global default entry count.

use std::sync::Arc;

use pagestore::{
    BincodeCoder, Page, PageConfig, PageEntry, StoreContext, DEFAULT_MAX_PAGE_ENTRIES,
};

type TestPage = Page<u64, String, BincodeCoder<u64, String>>;

// =============================================================================
// Helper Functions
// =============================================================================

fn coder() -> Arc<BincodeCoder<u64, String>> {
    Arc::new(BincodeCoder::new())
}

fn page_with_entries(config: PageConfig, count: usize) -> TestPage {
    let entries: Vec<_> = (0..count as u64)
        .map(|i| PageEntry::new(i, format!("value{}", i)))
        .collect();
    Page::sibling(Arc::new(StoreContext::new(config)), coder(), 0, None, entries)
}

// =============================================================================
// Split Policy
// =============================================================================

#[test]
fn test_single_entry_never_splits() {
    // Even an entry whose estimate dwarfs the budget stays put: splitting
    // one entry cannot shrink anything.
    let config = PageConfig::builder().max_page_memory(1).build();
    let page = page_with_entries(config, 1);
    let mut guard = page.write_lock();
    guard.set_average(1_000_000, 1);

    assert!(!guard.split_condition());
}

#[test]
fn test_memory_budget_exceeded() {
    let config = PageConfig::builder().max_page_memory(100).build();
    let page = page_with_entries(config, 2);
    let mut guard = page.write_lock();

    // (150 + 12) * 2 = 324 > 100
    guard.set_average(150, 1);

    assert!(guard.split_condition());
}

#[test]
fn test_memory_budget_not_exceeded_falls_through() {
    // A generous memory budget defers to the entry-count checks.
    let config = PageConfig::builder()
        .max_page_memory(1_000_000)
        .max_page_entries(10)
        .build();

    let page = page_with_entries(config.clone(), 11);
    assert!(page.read_lock().split_condition());

    let page = page_with_entries(config, 10);
    assert!(!page.read_lock().split_condition());
}

#[test]
fn test_entry_budget_with_memory_budget_unset() {
    let config = PageConfig::builder()
        .max_page_memory(0)
        .max_page_entries(10)
        .build();

    let page = page_with_entries(config.clone(), 11);
    assert!(page.read_lock().split_condition());

    let page = page_with_entries(config, 10);
    assert!(!page.read_lock().split_condition());
}

#[test]
fn test_global_default_when_nothing_configured() {
    let config = PageConfig::default();

    let page = page_with_entries(config.clone(), DEFAULT_MAX_PAGE_ENTRIES + 1);
    assert!(page.read_lock().split_condition());

    let page = page_with_entries(config, DEFAULT_MAX_PAGE_ENTRIES);
    assert!(!page.read_lock().split_condition());
}

#[test]
fn test_zero_entry_budget_falls_to_default() {
    // An explicit zero means unset, leaving the global default in charge.
    let config = PageConfig::builder().max_page_entries(0).build();

    let page = page_with_entries(config, DEFAULT_MAX_PAGE_ENTRIES + 1);
    assert!(page.read_lock().split_condition());
}
