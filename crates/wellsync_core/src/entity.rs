//! Persisted entity kinds.

use crate::types::{SyncStatus, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The four logical collections of the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Cached user profiles (and the device's own profile).
    Users,
    /// Well-being entries.
    Entries,
    /// Notes staged for upload.
    QueuedNotes,
    /// Key/value metadata (cursors, device identity).
    Meta,
}

impl Collection {
    /// All collections.
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Entries,
        Collection::QueuedNotes,
        Collection::Meta,
    ];

    /// Stable name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Entries => "entries",
            Self::QueuedNotes => "queued_notes",
            Self::Meta => "meta",
        }
    }
}

/// A row type stored in one collection, keyed by a stable string id.
pub trait Entity: Serialize + DeserializeOwned {
    /// Collection holding rows of this type.
    const COLLECTION: Collection;

    /// Primary key.
    fn id(&self) -> &str;
}

/// A well-being record.
///
/// Never physically removed: deletion sets `deleted` so the change can be
/// propagated by sync. `last_modified >= ts` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Client-generated id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Creation time.
    pub ts: Timestamp,
    /// Mood score.
    pub mood: Option<i64>,
    /// Stress score.
    pub stress: Option<i64>,
    /// Free-text note.
    pub note: Option<String>,
    /// Last modification time, non-decreasing per id.
    pub last_modified: Timestamp,
    /// Soft-delete flag.
    pub deleted: bool,
    /// Upload state.
    pub sync_status: SyncStatus,
}

impl Entity for Entry {
    const COLLECTION: Collection = Collection::Entries;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A user profile.
///
/// Remote profiles are read-only copies of server-owned records; fields
/// other than `id`, `label` and `created_at` are cached as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: String,
    /// Display name.
    pub label: Option<String>,
    /// Creation time, when known.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Other server-provided fields, verbatim.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Entity for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A professional's offline annotation awaiting upload.
///
/// Transient: it lives in the queue only until the backend acknowledges it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedNote {
    /// Client-generated id; becomes the entry id on the backend.
    pub id: String,
    /// User the note is about.
    pub user_id: String,
    /// Creation time.
    pub ts: Timestamp,
    /// Note text.
    pub note: String,
    /// Optional mood score.
    #[serde(default)]
    pub mood: Option<i64>,
    /// Optional stress score.
    #[serde(default)]
    pub stress: Option<i64>,
    /// Last modification time; uploads fall back to `ts` when unset.
    #[serde(default)]
    pub last_modified: Option<Timestamp>,
    /// Soft-delete flag.
    #[serde(default)]
    pub deleted: bool,
}

impl Entity for QueuedNote {
    const COLLECTION: Collection = Collection::QueuedNotes;

    fn id(&self) -> &str {
        &self.id
    }
}
