//! Tests for the sequential iterator
//!
//! These tests verify:
//! - Single-iterator exclusivity and release semantics
//! - FIFO replay and repeatability
//! - Terminal-state behavior after exhaustion and release
//! - Corruption surfacing as errors instead of silent exhaustion

use std::fs::{self, OpenOptions};
use std::path::Path;

use flatkv::{FlatError, FlatStore, Mode};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Build and commit a store holding `count` numbered entries
fn committed_store(dir: &Path, count: usize) -> FlatStore {
    let store = FlatStore::open_path(dir, Mode::WriteOnly).unwrap();
    for i in 0..count {
        let key = format!("key{:04}", i);
        let val = format!("value{:04}", i);
        store.put(key.as_bytes(), val.as_bytes()).unwrap();
    }
    store.commit().unwrap();
    store
}

fn collect_pairs(store: &FlatStore) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut iter = store.new_iterator(&[], &[]).unwrap();
    let mut pairs = Vec::new();
    while iter.next() {
        pairs.push((iter.key().to_vec(), iter.value().to_vec()));
    }
    assert!(iter.error().is_none());
    pairs
}

// =============================================================================
// Exclusivity Tests
// =============================================================================

#[test]
fn test_second_iterator_rejected_while_open() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 5);

    let first = store.new_iterator(&[], &[]).unwrap();
    assert!(store.new_iterator(&[], &[]).is_none());
    drop(first);
}

#[test]
fn test_release_allows_new_iterator() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 5);

    let mut first = store.new_iterator(&[], &[]).unwrap();
    first.release();

    assert!(store.new_iterator(&[], &[]).is_some());
}

#[test]
fn test_drop_releases_iterator() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 5);

    {
        let _iter = store.new_iterator(&[], &[]).unwrap();
    }
    assert!(store.new_iterator(&[], &[]).is_some());
}

#[test]
fn test_release_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 5);

    let mut iter = store.new_iterator(&[], &[]).unwrap();
    iter.release();
    iter.release();

    let second = store.new_iterator(&[], &[]).unwrap();
    // Dropping the doubly-released first iterator must not free the
    // exclusivity slot out from under the second
    drop(iter);
    assert!(store.new_iterator(&[], &[]).is_none());
    drop(second);
}

#[test]
fn test_iterator_rejected_before_commit() {
    let temp = TempDir::new().unwrap();
    let store = FlatStore::open_path(temp.path(), Mode::WriteOnly).unwrap();
    store.put(b"key", b"value").unwrap();

    assert!(store.new_iterator(&[], &[]).is_none());
}

#[test]
fn test_iterator_ignores_prefix_and_start() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 5);

    // Whatever is passed, iteration covers the whole store
    let mut iter = store.new_iterator(b"key0003", b"nonsense").unwrap();
    let mut n = 0;
    while iter.next() {
        n += 1;
    }
    assert_eq!(n, 5);
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_iteration_is_repeatable() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 100);

    let first = collect_pairs(&store);
    let second = collect_pairs(&store);

    assert_eq!(first.len(), 100);
    assert_eq!(first, second);
}

#[test]
fn test_next_false_after_exhaustion() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 3);

    let mut iter = store.new_iterator(&[], &[]).unwrap();
    while iter.next() {}

    assert!(!iter.next());
    assert!(!iter.next());
    assert!(iter.error().is_none());
}

#[test]
fn test_next_false_after_release() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 3);

    let mut iter = store.new_iterator(&[], &[]).unwrap();
    assert!(iter.next());
    iter.release();

    assert!(!iter.next());
    assert!(iter.error().is_none());
}

#[test]
fn test_key_value_track_current_record() {
    let temp = TempDir::new().unwrap();
    let store = FlatStore::open_path(temp.path(), Mode::WriteOnly).unwrap();
    store.put(b"first", b"1").unwrap();
    store.put(b"second", b"2").unwrap();
    store.commit().unwrap();

    let mut iter = store.new_iterator(&[], &[]).unwrap();

    assert!(iter.next());
    assert_eq!(iter.key(), b"first");
    assert_eq!(iter.value(), b"1");
    let copied = iter.key().to_vec();

    assert!(iter.next());
    assert_eq!(iter.key(), b"second");
    assert_eq!(iter.value(), b"2");

    // The copy taken before the advance is untouched
    assert_eq!(copied, b"first");
}

#[test]
fn test_empty_store_exhausts_immediately() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 0);

    let mut iter = store.new_iterator(&[], &[]).unwrap();
    assert!(!iter.next());
    assert!(iter.error().is_none());
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_truncated_data_file_surfaces_error() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 10);
    store.close().unwrap();

    // Chop a few bytes off the end so the chunk read comes up short
    let data_path = temp.path().join("flat.db");
    let len = fs::metadata(&data_path).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(&data_path)
        .unwrap()
        .set_len(len - 3)
        .unwrap();

    let reopened = FlatStore::open_path(temp.path(), Mode::ReadOnly).unwrap();
    let mut iter = reopened.new_iterator(&[], &[]).unwrap();
    assert!(!iter.next());
    assert!(matches!(iter.error(), Some(FlatError::ReadFailure(_))));
}

#[test]
fn test_partial_index_entry_surfaces_error() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 10);
    store.close().unwrap();

    // A partial trailing index entry is corruption, not exhaustion
    let index_path = temp.path().join("flat.index");
    let mut index = fs::read(&index_path).unwrap();
    index.extend_from_slice(&[0u8; 4]);
    fs::write(&index_path, &index).unwrap();

    let reopened = FlatStore::open_path(temp.path(), Mode::ReadOnly).unwrap();
    let mut iter = reopened.new_iterator(&[], &[]).unwrap();
    let mut n = 0;
    while iter.next() {
        n += 1;
    }
    assert_eq!(n, 10);
    assert!(matches!(iter.error(), Some(FlatError::ReadFailure(_))));
}

#[test]
fn test_malformed_record_surfaces_error() {
    let temp = TempDir::new().unwrap();
    let store = FlatStore::open_path(temp.path(), Mode::WriteOnly).unwrap();
    store.put(b"abcdefgh", b"ijklmnop").unwrap();
    store.commit().unwrap();
    store.close().unwrap();

    // Same length, but every byte claims another length byte follows
    let data_path = temp.path().join("flat.db");
    let len = fs::metadata(&data_path).unwrap().len() as usize;
    fs::write(&data_path, vec![0x80u8; len]).unwrap();

    let reopened = FlatStore::open_path(temp.path(), Mode::ReadOnly).unwrap();
    let mut iter = reopened.new_iterator(&[], &[]).unwrap();
    assert!(!iter.next());
    assert!(matches!(iter.error(), Some(FlatError::ReadFailure(_))));
}

#[test]
fn test_backwards_index_surfaces_error() {
    let temp = TempDir::new().unwrap();
    let store = committed_store(temp.path(), 5);
    store.close().unwrap();

    // Two entries running backwards violate the monotonic invariant
    let index_path = temp.path().join("flat.index");
    let total = fs::read(&index_path).unwrap();
    let mut index = Vec::new();
    index.extend_from_slice(&total);
    index.extend_from_slice(&0u64.to_be_bytes());
    fs::write(&index_path, &index).unwrap();

    let reopened = FlatStore::open_path(temp.path(), Mode::ReadOnly).unwrap();
    let mut iter = reopened.new_iterator(&[], &[]).unwrap();
    let mut n = 0;
    while iter.next() {
        n += 1;
    }
    assert_eq!(n, 5);
    assert!(matches!(iter.error(), Some(FlatError::ReadFailure(_))));
}
