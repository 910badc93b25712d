//! Error types for the local store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the local store.
///
/// Every variant is fatal to the call that produced it and is handed back
/// to the caller; nothing is retried inside the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Journal backend failure.
    #[error("storage error: {0}")]
    Storage(#[from] wellsync_storage::StorageError),

    /// I/O error outside the journal (directory, lock file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An entity could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A checksummed journal frame held undecodable content.
    #[error("journal corruption at offset {offset}: {message}")]
    Corrupted {
        /// Offset of the offending frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Another process holds the store directory.
    #[error("store directory is locked by another process: {0}")]
    Locked(String),

    /// The store path exists but is not a directory.
    #[error("not a store directory: {0}")]
    NotADirectory(String),
}

impl StoreError {
    pub(crate) fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}
