//! Mapping between wire shapes and stored rows.

use wellsync_core::{Entry, QueuedNote, SyncStatus, Timestamp, User};
use wellsync_protocol::{EntryPayload, RemoteEntry, RemoteUser};

const CREATED_AT_FIELD: &str = "created_at";

/// Canonical upload shape of a stored entry.
pub(crate) fn entry_payload(entry: &Entry) -> EntryPayload {
    EntryPayload {
        id: entry.id.clone(),
        ts: entry.ts.to_string(),
        mood: entry.mood,
        stress: entry.stress,
        note: entry.note.clone(),
        last_modified: entry.last_modified.to_string(),
        deleted: entry.deleted,
    }
}

/// Upload shape of a queued note, tagged with the submitting professional.
pub(crate) fn note_payload(note: &QueuedNote, professional: Option<&str>) -> EntryPayload {
    let text = match professional {
        Some(professional) => Some(attribute(professional, &note.note)),
        None if note.note.trim().is_empty() => None,
        None => Some(note.note.clone()),
    };

    EntryPayload {
        id: note.id.clone(),
        ts: note.ts.to_string(),
        mood: note.mood,
        stress: note.stress,
        note: text,
        last_modified: note
            .last_modified
            .as_ref()
            .unwrap_or(&note.ts)
            .to_string(),
        deleted: note.deleted,
    }
}

/// `[DOCPRO:<professional>] <note>`, trimmed.
pub(crate) fn attribute(professional: &str, note: &str) -> String {
    format!("[DOCPRO:{professional}] {note}").trim().to_string()
}

/// A pulled row as stored locally; the server's copy counts as synced.
///
/// `fallback_user` is used when the server omits `user_id`.
pub(crate) fn cached_entry(remote: &RemoteEntry, fallback_user: &str) -> Entry {
    let ts = Timestamp::new(remote.ts.as_str());
    Entry {
        id: remote.id.clone(),
        user_id: remote
            .user_id
            .clone()
            .unwrap_or_else(|| fallback_user.to_string()),
        last_modified: Timestamp::new(remote.modified_at()).max_with(ts.clone()),
        ts,
        mood: remote.mood,
        stress: remote.stress,
        note: remote.note.clone(),
        deleted: remote.deleted,
        sync_status: SyncStatus::Synced,
    }
}

/// A listed user as cached locally, keeping unknown fields verbatim.
pub(crate) fn cached_user(remote: &RemoteUser) -> User {
    let mut attributes = remote.extra.clone();
    let created_at = match attributes.remove(CREATED_AT_FIELD) {
        Some(serde_json::Value::String(value)) => Some(Timestamp::new(value)),
        Some(serde_json::Value::Null) | None => None,
        Some(other) => {
            attributes.insert(CREATED_AT_FIELD.to_string(), other);
            None
        }
    };

    User {
        id: remote.id.clone(),
        label: remote.label.clone(),
        created_at,
        attributes,
    }
}
