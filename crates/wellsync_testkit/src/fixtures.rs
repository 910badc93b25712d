//! Test fixtures and store helpers.

use std::sync::Arc;
use tempfile::TempDir;
use wellsync_core::{LocalStore, QueuedNote, Timestamp};
use wellsync_protocol::{RemoteEntry, RemoteUser};

/// A store in a temporary directory that is removed on drop.
pub struct TestStore {
    /// The shared store handle.
    pub store: Arc<LocalStore>,
    dir: TempDir,
}

impl TestStore {
    /// Opens a fresh store.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = LocalStore::open(dir.path()).expect("Failed to open store");
        Self {
            store: Arc::new(store),
            dir,
        }
    }

    /// Closes and reopens the store from disk.
    ///
    /// Panics if another handle to the store is still alive.
    pub fn reopen(self) -> Self {
        let Self { store, dir } = self;
        drop(Arc::into_inner(store).expect("store handle still shared"));
        let store = LocalStore::open(dir.path()).expect("Failed to reopen store");
        Self {
            store: Arc::new(store),
            dir,
        }
    }

    /// Directory holding the store.
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = LocalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A server row whose `ts` equals its `last_modified`.
pub fn remote_entry(id: &str, modified: &str) -> RemoteEntry {
    RemoteEntry {
        id: id.to_string(),
        user_id: None,
        ts: modified.to_string(),
        mood: Some(3),
        stress: Some(2),
        note: None,
        last_modified: Some(modified.to_string()),
        deleted: false,
    }
}

/// A listed user with no extra fields.
pub fn remote_user(id: &str, label: &str) -> RemoteUser {
    RemoteUser {
        id: id.to_string(),
        label: Some(label.to_string()),
        extra: Default::default(),
    }
}

/// A queued note with fixed timestamps.
pub fn queued_note(id: &str, user_id: &str, text: &str, at: &str) -> QueuedNote {
    QueuedNote {
        id: id.to_string(),
        user_id: user_id.to_string(),
        ts: Timestamp::new(at),
        note: text.to_string(),
        mood: None,
        stress: None,
        last_modified: Some(Timestamp::new(at)),
        deleted: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wellsync_core::OutboundQueue;

    #[test]
    fn test_store_survives_reopen() {
        let store = TestStore::new();
        OutboundQueue::new(&store)
            .enqueue(&queued_note("n1", "u1", "hi", "2024-01-01T00:00:00Z"))
            .unwrap();

        let store = store.reopen();
        assert_eq!(OutboundQueue::new(&store).len(), 1);
        assert!(store.path().join("journal.wsj").exists());
    }
}
