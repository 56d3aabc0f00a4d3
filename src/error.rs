//! Error types for FlatKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using FlatError
pub type Result<T> = std::result::Result<T, FlatError>;

/// Unified error type for FlatKV operations
#[derive(Debug, Error)]
pub enum FlatError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("store is read only")]
    ReadOnly,

    #[error("store is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Stream Errors
    // -------------------------------------------------------------------------
    #[error("write failure: {0}")]
    WriteFailure(String),

    #[error("read failure: {0}")]
    ReadFailure(String),

    // -------------------------------------------------------------------------
    // Validation Errors
    // -------------------------------------------------------------------------
    #[error("empty key or value")]
    EmptyEntry,

    // -------------------------------------------------------------------------
    // Interface Errors
    // -------------------------------------------------------------------------
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}
