//! Engine core
//!
//! Owns the data and index files, the in-memory write buffer, and the
//! one-way write → read lifecycle.
//!
//! ## Concurrency Model
//!
//! One exclusive lock guards all mutable state: the write buffer, the
//! pending-record count, the cumulative offset, the mode, and the
//! iterator-exclusivity flag. A `put` holds the lock through encoding,
//! buffering, and any triggered chunk flush, so concurrent writers
//! serialize on the disk write as well as the logical append. Records
//! from different writers never interleave; their relative order is
//! whatever order the lock was acquired in.

use std::cmp;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::BytesMut;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::codec;
use crate::config::Config;
use crate::error::{FlatError, Result};

use super::batch::FlatBatch;
use super::iterator::FlatIterator;

/// Data file name during the write phase
const TEMPORARY_NAME: &str = "tmp.db";
/// Data file name once committed
const SYNCED_NAME: &str = "flat.db";
/// Index file name, shared by both phases
const INDEX_NAME: &str = "flat.index";

/// Store lifecycle mode
///
/// The only transition is `WriteOnly` → `ReadOnly`, performed by
/// [`FlatStore::commit`]. It is irreversible for the life of the
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Accepts `put`; iteration is rejected
    WriteOnly,
    /// Accepts iteration; `put` fails with `ReadOnly`
    ReadOnly,
}

/// Mutable engine state, guarded by the instance's single lock
struct Inner {
    /// Data stream handle, `None` once closed
    data: Option<File>,
    /// Index stream handle, `None` once closed
    index: Option<File>,
    /// Current lifecycle mode
    mode: Mode,
    /// Encoded records not yet flushed as a chunk
    buf: Vec<u8>,
    /// Number of records currently in `buf`
    items: usize,
    /// Cumulative data-stream offset: bytes written so far in write
    /// mode, bytes consumed so far in read mode
    offset: u64,
    /// Whether an unreleased iterator exists
    iterating: bool,
}

impl Inner {
    /// Make room for `n` more buffered bytes.
    ///
    /// Headroom beyond the request is `len / max(1, items / reference)`:
    /// generous (doubling-style) while few records are buffered, shrinking
    /// as the unflushed count grows past `reference` so a long-lived
    /// buffer's peak over-allocation stays bounded. The buffer never
    /// shrinks during the write phase.
    fn grow(&mut self, n: usize, reference: usize) {
        let len = self.buf.len();
        if self.buf.capacity() - len < n {
            let div = cmp::max(1, self.items / cmp::max(1, reference));
            self.buf.reserve_exact(n + len / div);
        }
    }
}

/// The flat store engine
///
/// A store is opened bound to one directory in either write-only or
/// read-only mode. Write mode appends records through an in-memory
/// buffer flushed as chunks; a single [`commit`](FlatStore::commit)
/// seals the store, after which the same instance serves FIFO
/// iteration. The instance is the sole owner of its two files.
pub struct FlatStore {
    /// Engine configuration
    config: Config,
    /// All mutable state behind one exclusive lock
    inner: Mutex<Inner>,
}

impl FlatStore {
    /// Open a store in the given mode
    ///
    /// Write-only mode creates the data directory if needed, then
    /// creates (truncating) the temporary data file and the index file.
    /// Read-only mode opens the committed data file and the index file,
    /// failing if either is missing.
    pub fn open(config: Config, mode: Mode) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let (data, index) = match mode {
            Mode::ReadOnly => (
                File::open(config.data_dir.join(SYNCED_NAME))?,
                File::open(config.data_dir.join(INDEX_NAME))?,
            ),
            Mode::WriteOnly => (
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(config.data_dir.join(TEMPORARY_NAME))?,
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(config.data_dir.join(INDEX_NAME))?,
            ),
        };

        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                data: Some(data),
                index: Some(index),
                mode,
                buf: Vec::new(),
                items: 0,
                offset: 0,
                iterating: false,
            }),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path, mode: Mode) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build(), mode)
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Append a key/value pair to the store
    ///
    /// The encoded record is staged in the write buffer; once the buffer
    /// reaches the configured chunk size it is flushed to disk as one
    /// chunk before this call returns.
    ///
    /// Fails with `EmptyEntry` (nothing mutated) if either side is
    /// empty, and with `ReadOnly` once the store has been committed.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() || value.is_empty() {
            return Err(FlatError::EmptyEntry);
        }
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.mode == Mode::ReadOnly {
            return Err(FlatError::ReadOnly);
        }

        let needed = codec::record_len(key, value);
        inner.grow(needed, self.config.growth_reference);
        let appended = codec::put_record(&mut inner.buf, key, value);
        inner.items += 1;

        // The offset is the global end of the data stream, buffered
        // bytes included, so only the fresh bytes are added.
        inner.offset += appended as u64;

        self.write_chunk(inner, false)
    }

    /// Flush the buffer as one chunk and record the new cumulative
    /// offset in the index
    ///
    /// Below the chunk-size threshold this is a no-op unless `force` is
    /// set. Forced flushes happen exactly once per instance, during
    /// commit or close, and may write a zero-length chunk.
    fn write_chunk(&self, inner: &mut Inner, force: bool) -> Result<()> {
        if inner.buf.len() < self.config.chunk_size && !force {
            return Ok(());
        }

        // Step one, flush the buffered records
        let data = inner.data.as_mut().ok_or(FlatError::Closed)?;
        let written = data.write(&inner.buf)?;
        if written != inner.buf.len() {
            return Err(FlatError::WriteFailure(format!(
                "chunk: wrote {} of {} bytes",
                written,
                inner.buf.len()
            )));
        }
        debug!(bytes = written, records = inner.items, "flushed chunk");
        inner.buf.clear();
        inner.items = 0;

        // Step two, flush the chunk offset
        let index = inner.index.as_mut().ok_or(FlatError::Closed)?;
        let written = index.write(&inner.offset.to_be_bytes())?;
        if written != 8 {
            return Err(FlatError::WriteFailure(format!(
                "index entry: wrote {} of 8 bytes",
                written
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Load the next chunk into `out`
    ///
    /// Returns `Ok(false)` when the index stream is cleanly exhausted.
    /// A partial index entry, an index offset running backwards, or a
    /// short data read all fail with `ReadFailure`.
    pub(super) fn read_chunk(&self, out: &mut BytesMut) -> Result<bool> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        // Step one, the next cumulative offset from the index
        let index = inner.index.as_mut().ok_or(FlatError::Closed)?;
        let mut raw = [0u8; 8];
        let got = read_full(index, &mut raw)?;
        if got == 0 {
            return Ok(false);
        }
        if got != 8 {
            return Err(FlatError::ReadFailure(format!(
                "index entry: read {} of 8 bytes",
                got
            )));
        }
        let next = u64::from_be_bytes(raw);
        let size = next
            .checked_sub(inner.offset)
            .ok_or_else(|| FlatError::ReadFailure("index offset ran backwards".to_string()))?
            as usize;
        inner.offset = next;

        // Step two, the chunk bytes themselves
        out.resize(size, 0);
        let data = inner.data.as_mut().ok_or(FlatError::Closed)?;
        let got = read_full(data, out)?;
        if got != size {
            return Err(FlatError::ReadFailure(format!(
                "chunk: read {} of {} bytes",
                got, size
            )));
        }
        debug!(bytes = size, "loaded chunk");
        Ok(true)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush all in-memory data to disk and switch the store to read mode
    ///
    /// The durability sequence runs in order: force-flush the final
    /// chunk, fsync both files, close them, atomically rename the
    /// temporary data file to its final name, fsync the containing
    /// directory, then reopen both files read-only with the offset
    /// counter reset (it thereafter tracks consumed bytes). The first
    /// failing step aborts the sequence; completed steps are not rolled
    /// back. The transition is one-way.
    pub fn commit(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.mode == Mode::ReadOnly {
            return Err(FlatError::ReadOnly);
        }

        self.finish(inner)?;
        fs::rename(
            self.config.data_dir.join(TEMPORARY_NAME),
            self.config.data_dir.join(SYNCED_NAME),
        )?;
        sync_dir(&self.config.data_dir)?;
        inner.mode = Mode::ReadOnly;
        inner.offset = 0;

        // Reopen the files in read-only mode
        inner.data = Some(File::open(self.config.data_dir.join(SYNCED_NAME))?);
        inner.index = Some(File::open(self.config.data_dir.join(INDEX_NAME))?);
        info!(path = %self.config.data_dir.display(), "committed store");
        Ok(())
    }

    /// Force-flush, fsync, and close both files
    fn finish(&self, inner: &mut Inner) -> Result<()> {
        self.write_chunk(inner, true)?;
        let data = inner.data.as_mut().ok_or(FlatError::Closed)?;
        data.sync_all()?;
        let index = inner.index.as_mut().ok_or(FlatError::Closed)?;
        index.sync_all()?;
        inner.data = None;
        inner.index = None;
        Ok(())
    }

    /// Release file handles without committing
    ///
    /// In write mode any buffered records are force-flushed and both
    /// files fsynced first; no rename or reopen happens, so the data
    /// file keeps its temporary name. In read mode, or when already
    /// closed, the handles are simply dropped. Safe to call more than
    /// once.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.mode == Mode::WriteOnly && inner.data.is_some() {
            self.finish(inner)
        } else {
            inner.data = None;
            inner.index = None;
            Ok(())
        }
    }

    // =========================================================================
    // Unsupported Surface
    // =========================================================================

    /// Presence checks are not offered by this engine
    pub fn has(&self, _key: &[u8]) -> Result<bool> {
        Err(FlatError::Unsupported("has"))
    }

    /// Random lookups are not offered by this engine
    pub fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Err(FlatError::Unsupported("get"))
    }

    /// Deletion is not offered by this engine
    pub fn delete(&self, _key: &[u8]) -> Result<()> {
        Err(FlatError::Unsupported("delete"))
    }

    // =========================================================================
    // Front-Ends
    // =========================================================================

    /// Create a batch that stages writes until drained into this store
    pub fn new_batch(&self) -> FlatBatch<'_> {
        FlatBatch::new(self)
    }

    /// Create an iterator over the whole store in first-in-first-out order
    ///
    /// `prefix` and `start` exist only for interface compatibility with
    /// keyed stores and have no effect; iteration always covers the
    /// entire committed data set in original write order.
    ///
    /// Returns `None` if an unreleased iterator already exists, if the
    /// store has not been committed, or if the streams cannot be
    /// rewound. Both streams are repositioned to their start and any
    /// residual buffer content is discarded, so iteration begins from
    /// the logical start regardless of prior cursor position.
    pub fn new_iterator(&self, _prefix: &[u8], _start: &[u8]) -> Option<FlatIterator<'_>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.mode != Mode::ReadOnly || inner.iterating {
            return None;
        }
        let data = inner.data.as_mut()?;
        let index = inner.index.as_mut()?;
        if data.seek(SeekFrom::Start(0)).is_err() || index.seek(SeekFrom::Start(0)).is_err() {
            return None;
        }
        inner.offset = 0;
        inner.buf.clear();
        inner.items = 0;
        inner.iterating = true;
        Some(FlatIterator::new(self))
    }

    /// Clear the iterator-exclusivity flag
    pub(super) fn release_iterator(&self) {
        self.inner.lock().iterating = false;
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the store directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the current lifecycle mode
    pub fn mode(&self) -> Mode {
        self.inner.lock().mode
    }

    /// Get the cumulative offset: bytes written in write mode, bytes
    /// consumed in read mode
    pub fn offset(&self) -> u64 {
        self.inner.lock().offset
    }

    /// Get the number of bytes waiting in the write buffer
    pub fn buffered_bytes(&self) -> usize {
        self.inner.lock().buf.len()
    }

    /// Get the number of records waiting in the write buffer
    pub fn pending_records(&self) -> usize {
        self.inner.lock().items
    }
}

// =============================================================================
// Private Helpers
// =============================================================================

/// Read until `buf` is full or the stream ends, returning the bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Fsync a directory so a rename inside it survives a crash
#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

/// Directory handles cannot be fsynced on this platform
#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> Result<()> {
    Ok(())
}
