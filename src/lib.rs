//! # FlatKV
//!
//! An append-once, read-in-order flat-file key-value store for workloads
//! where random reads are never required:
//! - append-only writes, buffered in memory and flushed as multi-megabyte chunks
//! - a raw two-file layout: a data stream plus a chunk-offset index
//! - a single, irreversible commit sealing the store for reading
//! - first-in-first-out iteration over the whole data set
//!
//! Keys carry no ordering or uniqueness semantics; an entry's only
//! identity is its position in the write order. In exchange the store
//! offers the best possible sequential write and read throughput.
//!
//! ## Architecture Overview
//!
//! ```text
//! put(key, value)
//!       │
//!       ▼
//! ┌─────────────┐      ┌──────────────┐  threshold  ┌────────────┐
//! │ Record      │─────►│ Write Buffer │────────────►│ Chunk      │
//! │ Codec       │      │ (in memory)  │             │ Flush      │
//! └─────────────┘      └──────────────┘             └─────┬──────┘
//!                                                         │
//!                                     ┌───────────────────┼─────────┐
//!                                     ▼                             ▼
//!                               ┌──────────┐                ┌────────────┐
//!                               │ tmp.db   │                │ flat.index │
//!                               │ (data)   │                │ (offsets)  │
//!                               └──────────┘                └────────────┘
//!
//! commit: final flush → fsync → rename tmp.db → flat.db → fsync dir → read only
//!
//! iterate: index entry → chunk read → record decode → (key, value) in FIFO order
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod codec;
pub mod config;
pub mod error;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use error::{FlatError, Result};
pub use store::{FlatBatch, FlatIterator, FlatStore, Mode};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of FlatKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
