//! Store Module
//!
//! The append-only storage engine and its front-ends.
//!
//! ## Responsibilities
//! - Buffer encoded records in memory and flush them as chunks
//! - Track chunk boundaries in the offset index
//! - Drive the one-way write → read lifecycle (commit)
//! - Stage batched writes and drain them in order
//! - Replay committed records in first-in-first-out order
//!
//! ## On-Disk Layout (per store directory)
//! ```text
//! ┌────────────┬───────────────────────────────────────────────┐
//! │ tmp.db     │ data stream while writing (renamed on commit) │
//! │ flat.db    │ data stream once committed                    │
//! │ flat.index │ one 8-byte big-endian cumulative offset per   │
//! │            │ flushed chunk                                 │
//! └────────────┴───────────────────────────────────────────────┘
//! ```

mod batch;
mod engine;
mod iterator;

pub use batch::FlatBatch;
pub use engine::{FlatStore, Mode};
pub use iterator::FlatIterator;
