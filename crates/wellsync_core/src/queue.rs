//! Outbound queue of notes awaiting acknowledgement.

use crate::entity::QueuedNote;
use crate::error::StoreResult;
use crate::store::LocalStore;
use crate::types::{new_id, Timestamp};

/// Mutations staged for upload.
///
/// An item leaves the queue only through [`OutboundQueue::clear`], which the
/// sync engine calls with ids the backend acknowledged. A crash between
/// sending and clearing therefore means a re-send, never a loss.
#[derive(Debug, Clone, Copy)]
pub struct OutboundQueue<'a> {
    store: &'a LocalStore,
}

impl<'a> OutboundQueue<'a> {
    /// Queue view over `store`.
    pub fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    /// Adds `note`, replacing any queued note with the same id.
    pub fn enqueue(&self, note: &QueuedNote) -> StoreResult<()> {
        self.store.put(note)
    }

    /// Builds and enqueues a fresh note about `user_id`.
    pub fn queue_note(&self, user_id: &str, text: &str) -> StoreResult<QueuedNote> {
        let now = Timestamp::now();
        let note = QueuedNote {
            id: new_id(),
            user_id: user_id.to_string(),
            ts: now.clone(),
            note: text.to_string(),
            mood: None,
            stress: None,
            last_modified: Some(now),
            deleted: false,
        };
        self.enqueue(&note)?;
        Ok(note)
    }

    /// Every queued note, ordered by id.
    pub fn list_queued(&self) -> StoreResult<Vec<QueuedNote>> {
        self.store.all()
    }

    /// Removes exactly the given ids; returns how many were queued.
    pub fn clear<S: AsRef<str>>(&self, ids: &[S]) -> StoreResult<usize> {
        self.store.delete_many::<QueuedNote, S>(ids)
    }

    /// Number of queued notes.
    pub fn len(&self) -> usize {
        self.store.count::<QueuedNote>()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_note_fills_in_identity_and_time() {
        let store = LocalStore::open_in_memory().unwrap();
        let queue = OutboundQueue::new(&store);

        let note = queue.queue_note("u-1", "follow up").unwrap();
        assert_eq!(Some(&note.ts), note.last_modified.as_ref());
        assert!(!note.deleted);
        assert_eq!(queue.list_queued().unwrap(), vec![note]);
    }

    #[test]
    fn enqueue_is_idempotent_by_id() {
        let store = LocalStore::open_in_memory().unwrap();
        let queue = OutboundQueue::new(&store);

        let mut note = queue.queue_note("u-1", "first").unwrap();
        note.note = "second".into();
        queue.enqueue(&note).unwrap();

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.list_queued().unwrap()[0].note, "second");
    }

    #[test]
    fn clear_removes_only_listed_ids() {
        let store = LocalStore::open_in_memory().unwrap();
        let queue = OutboundQueue::new(&store);

        let a = queue.queue_note("u", "a").unwrap();
        let b = queue.queue_note("u", "b").unwrap();
        let c = queue.queue_note("u", "c").unwrap();

        let cleared = queue.clear(&[a.id.as_str(), c.id.as_str(), "unknown"]).unwrap();
        assert_eq!(cleared, 2);
        assert_eq!(queue.list_queued().unwrap(), vec![b]);
        assert!(!queue.is_empty());
    }
}
