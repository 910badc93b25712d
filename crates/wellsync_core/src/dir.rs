//! Store directory management.
//!
//! ```text
//! <store>/
//! ├─ LOCK          # Advisory lock, one process per store
//! └─ journal.wsj   # Framed mutation journal
//! ```

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.wsj";

/// An opened store directory holding the exclusive lock.
///
/// The lock is released when this value is dropped.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens (creating if missing) the store directory and locks it.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotADirectory`] if `path` exists and is a file
    /// - [`StoreError::Locked`] if another handle already holds the lock
    /// - I/O errors
    pub fn open(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(StoreError::NotADirectory(path.display().to_string()));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path.display().to_string()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the journal file.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let store_dir = StoreDir::open(&path).unwrap();
        assert!(path.join("LOCK").exists());
        assert_eq!(store_dir.path(), path);
        assert_eq!(store_dir.journal_path(), path.join("journal.wsj"));
    }

    #[test]
    fn second_open_is_locked_out() {
        let dir = tempdir().unwrap();
        let _held = StoreDir::open(dir.path()).unwrap();

        let result = StoreDir::open(dir.path());
        assert!(matches!(result, Err(StoreError::Locked(_))));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempdir().unwrap();
        drop(StoreDir::open(dir.path()).unwrap());
        assert!(StoreDir::open(dir.path()).is_ok());
    }

    #[test]
    fn file_path_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();

        let result = StoreDir::open(&file);
        assert!(matches!(result, Err(StoreError::NotADirectory(_))));
    }
}
