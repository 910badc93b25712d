//! Journal backend trait definition.

use crate::error::StorageResult;

/// An append-only byte journal.
///
/// # Invariants
///
/// - `append` returns the offset where the data starts
/// - `read_all` returns every byte appended (or installed by `replace`) so far
/// - after `sync` returns, appended data survives process termination
/// - `replace` is all-or-nothing: readers see either the old or the new journal
/// - implementations must be `Send + Sync` so a store handle can be shared
pub trait StorageBackend: Send + Sync {
    /// Reads the complete journal.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Appends `data` to the end of the journal and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. A failed append may leave a
    /// partial tail behind; readers are expected to detect and drop it.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Forces appended data (and file metadata) to durable storage.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current journal size in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Cuts the journal back to `new_size` bytes.
    ///
    /// Used to drop a torn tail found while replaying.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::TruncateBeyondEnd`] if `new_size` is
    /// larger than the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Atomically replaces the whole journal with `data` and syncs it.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;
}
