//! Sequential iterator
//!
//! Replays committed records chunk by chunk in original write order.

use bytes::{Buf, BytesMut};

use crate::codec;
use crate::error::FlatError;

use super::engine::FlatStore;

/// A single-owner cursor over a committed store
///
/// At most one unreleased iterator may exist per store;
/// [`FlatStore::new_iterator`] rejects a second acquisition immediately
/// rather than blocking. Dropping the iterator releases it.
pub struct FlatIterator<'a> {
    store: &'a FlatStore,
    /// Undecoded remainder of the current chunk
    chunk: BytesMut,
    /// Most recently decoded key
    key: Vec<u8>,
    /// Most recently decoded value
    val: Vec<u8>,
    /// Terminal error, set at most once
    err: Option<FlatError>,
    /// Whether the index stream reported clean exhaustion
    eof: bool,
    /// Whether the exclusivity flag has been given back
    released: bool,
}

impl<'a> FlatIterator<'a> {
    pub(super) fn new(store: &'a FlatStore) -> Self {
        Self {
            store,
            chunk: BytesMut::new(),
            key: Vec::new(),
            val: Vec::new(),
            err: None,
            eof: false,
            released: false,
        }
    }

    /// Move to the next key/value pair
    ///
    /// Returns false once the store is exhausted, a read or decode
    /// failure occurred, or the iterator was released;
    /// [`error`](Self::error) distinguishes failure from exhaustion.
    pub fn next(&mut self) -> bool {
        if self.eof || self.err.is_some() || self.released {
            return false;
        }
        // The final forced flush may have produced a zero-length chunk,
        // so keep pulling until there is something to decode.
        while self.chunk.is_empty() {
            match self.store.read_chunk(&mut self.chunk) {
                Ok(true) => {}
                Ok(false) => {
                    self.eof = true;
                    return false;
                }
                Err(err) => {
                    self.err = Some(err);
                    return false;
                }
            }
        }
        match codec::read_record(&self.chunk) {
            Ok((key, val, consumed)) => {
                self.key.clear();
                self.key.extend_from_slice(key);
                self.val.clear();
                self.val.extend_from_slice(val);
                self.chunk.advance(consumed);
                true
            }
            Err(err) => {
                // A record never spans chunks, so a partial record here
                // is corruption rather than exhaustion.
                self.err = Some(err);
                false
            }
        }
    }

    /// Key of the current pair
    ///
    /// The slice is owned by the iterator and stays valid until the next
    /// call to [`next`](Self::next); copy it for anything longer-lived.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Value of the current pair
    ///
    /// Same lifetime contract as [`key`](Self::key).
    pub fn value(&self) -> &[u8] {
        &self.val
    }

    /// Any accumulated error
    ///
    /// Exhausting all the key/value pairs is not considered an error.
    pub fn error(&self) -> Option<&FlatError> {
        self.err.as_ref()
    }

    /// Release the iterator, allowing a new one to be created
    ///
    /// Safe to call multiple times; also performed on drop.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.store.release_iterator();
        }
    }
}

impl Drop for FlatIterator<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
