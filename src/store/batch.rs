//! Batch writer
//!
//! Client-side staging for pending pairs, drained into the store with
//! ordinary puts. A batch buys the caller an admission-control knob
//! (`value_size`) and fewer engine calls per decision point, not a
//! reduction in engine lock contention: draining still serializes one
//! put at a time.

use parking_lot::RwLock;

use crate::error::{FlatError, Result};

use super::engine::FlatStore;

/// Pending pairs and their running byte totals
#[derive(Default)]
struct BatchInner {
    keys: Vec<Vec<u8>>,
    vals: Vec<Vec<u8>>,
    key_size: usize,
    val_size: usize,
}

/// A write-only staging area bound to one store
///
/// The batch exclusively owns its pending lists until drained; it
/// carries its own lock, independent of the engine's.
pub struct FlatBatch<'a> {
    store: &'a FlatStore,
    inner: RwLock<BatchInner>,
}

impl<'a> FlatBatch<'a> {
    pub(super) fn new(store: &'a FlatStore) -> Self {
        Self {
            store,
            inner: RwLock::new(BatchInner::default()),
        }
    }

    /// Queue a pair for a later write
    ///
    /// No validation happens here; an empty key or value is rejected by
    /// the store when the batch is drained.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        inner.key_size += key.len();
        inner.val_size += value.len();
        inner.keys.push(key.to_vec());
        inner.vals.push(value.to_vec());
        Ok(())
    }

    /// Deletion is not offered by this engine
    pub fn delete(&self, _key: &[u8]) -> Result<()> {
        Err(FlatError::Unsupported("delete"))
    }

    /// Amount of value bytes queued up for writing
    pub fn value_size(&self) -> usize {
        self.inner.read().val_size
    }

    /// Amount of key bytes queued up for writing
    pub fn key_size(&self) -> usize {
        self.inner.read().key_size
    }

    /// Number of pending pairs
    pub fn len(&self) -> usize {
        self.inner.read().keys.len()
    }

    /// Whether the batch holds no pending pairs
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain pending pairs into the store, in the order they were queued
    ///
    /// Not atomic: if a put fails, every earlier pair is already applied
    /// to the store and the remaining pairs are abandoned, so a failure
    /// means "prefix applied, suffix unknown". Pending state is kept
    /// either way; call [`reset`](Self::reset) to clear it.
    pub fn write(&self) -> Result<()> {
        let inner = self.inner.write();
        for (key, val) in inner.keys.iter().zip(inner.vals.iter()) {
            self.store.put(key, val)?;
        }
        Ok(())
    }

    /// Clear pending pairs and zero the byte totals for reuse
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.keys.clear();
        inner.vals.clear();
        inner.key_size = 0;
        inner.val_size = 0;
    }
}
