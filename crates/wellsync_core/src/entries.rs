//! Entry operations for the check-in device and the dashboard cache.

use crate::entity::{Entry, User};
use crate::error::StoreResult;
use crate::store::{LocalStore, WriteBatch};
use crate::types::{new_id, SyncStatus, Timestamp};
use std::cmp::Reverse;
use std::collections::BTreeSet;

/// Upper bound on pending entries handed to one upload.
pub const PENDING_PAGE_SIZE: usize = 200;

/// Default length of the recent-entries listing.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Fields of a new check-in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEntry {
    /// Owning user.
    pub user_id: String,
    /// Mood score.
    pub mood: Option<i64>,
    /// Stress score.
    pub stress: Option<i64>,
    /// Free-text note.
    pub note: Option<String>,
}

/// Counts of what the store holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    /// Cached users.
    pub users: usize,
    /// Entries, including soft-deleted ones.
    pub entries: usize,
    /// Entries not yet acknowledged.
    pub pending_entries: usize,
    /// Notes in the outbound queue.
    pub queued_notes: usize,
    /// Journal size in bytes.
    pub journal_bytes: u64,
}

impl LocalStore {
    /// Records a new check-in as `pending`.
    pub fn insert_entry(&self, new: NewEntry) -> StoreResult<Entry> {
        let now = Timestamp::now();
        let entry = Entry {
            id: new_id(),
            user_id: new.user_id,
            ts: now.clone(),
            mood: new.mood,
            stress: new.stress,
            note: new.note,
            last_modified: now,
            deleted: false,
            sync_status: SyncStatus::Pending,
        };
        self.put(&entry)?;
        Ok(entry)
    }

    /// Applies `change` to entry `id`, moves `last_modified` strictly
    /// forward and marks it `pending` again. Returns `None` if no such entry exists.
    ///
    /// `id`, `user_id` and `ts` are restored after `change` runs.
    pub fn update_entry<F>(&self, id: &str, change: F) -> StoreResult<Option<Entry>>
    where
        F: FnOnce(&mut Entry),
    {
        let Some(mut entry) = self.get::<Entry>(id)? else {
            return Ok(None);
        };
        let (original_id, user_id, ts) = (entry.id.clone(), entry.user_id.clone(), entry.ts.clone());

        change(&mut entry);
        entry.id = original_id;
        entry.user_id = user_id;
        entry.ts = ts;
        entry.last_modified =
            Timestamp::now_after(&entry.last_modified.clone().max_with(entry.ts.clone()));
        entry.sync_status = SyncStatus::Pending;

        self.put(&entry)?;
        Ok(Some(entry))
    }

    /// Marks entry `id` deleted so the deletion syncs; the row stays.
    pub fn soft_delete_entry(&self, id: &str) -> StoreResult<Option<Entry>> {
        self.update_entry(id, |entry| entry.deleted = true)
    }

    /// Most recent non-deleted entries of any user, newest `ts` first.
    pub fn list_entries(&self, limit: usize) -> StoreResult<Vec<Entry>> {
        let mut entries = self.query(|e: &Entry| !e.deleted)?;
        sort_newest_first(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }

    /// Non-deleted entries of `user_id`, newest `ts` first.
    pub fn list_entries_for_user(&self, user_id: &str) -> StoreResult<Vec<Entry>> {
        let mut entries = self.query(|e: &Entry| e.user_id == user_id && !e.deleted)?;
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    /// Entries awaiting upload, oldest `last_modified` first, at most `limit`.
    pub fn pending_entries(&self, limit: usize) -> StoreResult<Vec<Entry>> {
        let mut entries = self.query(|e: &Entry| e.sync_status != SyncStatus::Synced)?;
        entries.sort_by(|a, b| a.last_modified.cmp(&b.last_modified).then_with(|| a.id.cmp(&b.id)));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Like [`LocalStore::pending_entries`], restricted to `user_id`.
    pub fn pending_entries_for_user(&self, user_id: &str, limit: usize) -> StoreResult<Vec<Entry>> {
        let mut entries = self
            .query(|e: &Entry| e.user_id == user_id && e.sync_status != SyncStatus::Synced)?;
        entries.sort_by(|a, b| a.last_modified.cmp(&b.last_modified).then_with(|| a.id.cmp(&b.id)));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Marks the given entries `synced` in one frame; unknown ids are
    /// skipped. Returns how many rows changed. An empty slice performs no I/O.
    pub fn mark_synced<S: AsRef<str>>(&self, ids: &[S]) -> StoreResult<usize> {
        let unique: BTreeSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let mut batch = WriteBatch::new();
        for id in unique {
            if let Some(mut entry) = self.get::<Entry>(id)? {
                if entry.sync_status != SyncStatus::Synced {
                    entry.sync_status = SyncStatus::Synced;
                    batch.put(&entry)?;
                }
            }
        }
        let changed = batch.len();
        self.commit(batch)?;
        Ok(changed)
    }

    /// Upserts server rows (server authoritative, stored as `synced`).
    pub fn cache_entries(&self, entries: &[Entry]) -> StoreResult<()> {
        self.put_many(entries)
    }

    /// Upserts server user profiles.
    pub fn cache_users(&self, users: &[User]) -> StoreResult<()> {
        self.put_many(users)
    }

    /// Cached user profiles, ordered by id.
    pub fn list_cached_users(&self) -> StoreResult<Vec<User>> {
        self.all()
    }

    /// Counts for status displays.
    pub fn summary(&self) -> StoreResult<StoreSummary> {
        Ok(StoreSummary {
            users: self.count::<User>(),
            entries: self.count::<Entry>(),
            pending_entries: self
                .query(|e: &Entry| e.sync_status != SyncStatus::Synced)?
                .len(),
            queued_notes: self.count::<crate::entity::QueuedNote>(),
            journal_bytes: self.journal_size()?,
        })
    }
}

fn sort_newest_first(entries: &mut [Entry]) {
    entries.sort_by(|a, b| {
        Reverse(&a.ts)
            .cmp(&Reverse(&b.ts))
            .then_with(|| a.id.cmp(&b.id))
    });
}
