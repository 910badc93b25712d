//! Error types for journal storage.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a journal backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Truncation was asked to grow the journal.
    #[error("cannot truncate journal of {size} bytes to {requested} bytes")]
    TruncateBeyondEnd {
        /// The requested size.
        requested: u64,
        /// The current journal size.
        size: u64,
    },

    /// The backend refused a write (used by the in-memory backend to
    /// simulate a failing disk).
    #[error("write rejected: {0}")]
    WriteRejected(String),
}
