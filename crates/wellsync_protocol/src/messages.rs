//! Wire messages for the central backend.

use crate::error::ProtocolResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical entry shape sent to the backend.
///
/// `mood`, `stress` and `note` serialize as `null` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPayload {
    /// Client-generated entry id.
    pub id: String,
    /// Creation timestamp (ISO-8601).
    pub ts: String,
    /// Mood score.
    pub mood: Option<i64>,
    /// Stress score.
    pub stress: Option<i64>,
    /// Free-text note.
    pub note: Option<String>,
    /// Last modification timestamp (ISO-8601).
    pub last_modified: String,
    /// Soft-delete flag.
    pub deleted: bool,
}

/// Entry row as returned by the pull endpoints.
///
/// The server may omit `user_id` or send `last_modified: null`; both are
/// tolerated here and resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Entry id.
    pub id: String,
    /// Owning user.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Creation timestamp.
    pub ts: String,
    /// Mood score.
    #[serde(default)]
    pub mood: Option<i64>,
    /// Stress score.
    #[serde(default)]
    pub stress: Option<i64>,
    /// Free-text note.
    #[serde(default)]
    pub note: Option<String>,
    /// Last modification timestamp.
    #[serde(default)]
    pub last_modified: Option<String>,
    /// Soft-delete flag.
    #[serde(default)]
    pub deleted: bool,
}

impl RemoteEntry {
    /// Effective modification time: `last_modified`, or `ts` when the
    /// server sent none.
    pub fn modified_at(&self) -> &str {
        self.last_modified.as_deref().unwrap_or(&self.ts)
    }
}

/// User profile as listed by the backend.
///
/// Only `id` and `label` are interpreted; every other field is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUser {
    /// User id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub label: Option<String>,
    /// Remaining server-owned fields (`created_at`, `consent`, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// `GET /api/central/users` body: bare array or `{ "users": [...] }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum UsersListing {
    /// `[...]`
    Bare(Vec<RemoteUser>),
    /// `{ "users": [...] }`
    Wrapped {
        /// Listed users.
        #[serde(default)]
        users: Vec<RemoteUser>,
    },
}

impl UsersListing {
    /// Flattens either form into the listed users.
    pub fn into_users(self) -> Vec<RemoteUser> {
        match self {
            Self::Bare(users) | Self::Wrapped { users } => users,
        }
    }
}

/// Entry pull body: bare array or `{ "entries": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EntriesListing {
    /// `[...]`
    Bare(Vec<RemoteEntry>),
    /// `{ "entries": [...] }`
    Wrapped {
        /// Listed entries.
        #[serde(default)]
        entries: Vec<RemoteEntry>,
    },
}

impl EntriesListing {
    /// Flattens either form into the listed entries.
    pub fn into_entries(self) -> Vec<RemoteEntry> {
        match self {
            Self::Bare(entries) | Self::Wrapped { entries } => entries,
        }
    }
}

/// Bare user reference used by the dashboard upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    /// User id.
    pub id: String,
}

/// `POST /api/central/sync_entries` body. One user per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntriesRequest {
    /// Owning user of every entry below.
    pub user: UserRef,
    /// Entries to upsert.
    pub entries: Vec<EntryPayload>,
}

/// Sharing consent attached to the mobile user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consent {
    /// Whether the user shares check-ins with their professional.
    pub share_with_professional: bool,
}

/// User block of the mobile upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileUser {
    /// Device identity.
    pub id: String,
    /// Display name.
    pub label: String,
    /// Sharing consent.
    pub consent: Consent,
}

/// `POST /api/cleodoc/sync` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileSyncRequest {
    /// The device's user.
    pub user: MobileUser,
    /// Pending entries.
    pub entries: Vec<EntryPayload>,
}

/// Acknowledgement returned by both upload endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAck {
    /// Ids the server has durably accepted.
    #[serde(default)]
    pub synced_entry_ids: Vec<String>,
    /// Optional status string (`"ok"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl SyncAck {
    /// Acknowledges exactly `ids`.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            synced_entry_ids: ids.into_iter().map(Into::into).collect(),
            status: Some("ok".into()),
        }
    }
}

/// Encodes a message as a JSON body.
pub fn encode_json<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Decodes a JSON body into `T`.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> ProtocolResult<T> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use serde_json::json;

    #[test]
    fn entry_payload_serializes_absent_scores_as_null() {
        let payload = EntryPayload {
            id: "n-1".into(),
            ts: "2024-01-01T00:00:00Z".into(),
            mood: None,
            stress: None,
            note: Some("call back".into()),
            last_modified: "2024-01-01T00:00:00Z".into(),
            deleted: false,
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "n-1",
                "ts": "2024-01-01T00:00:00Z",
                "mood": null,
                "stress": null,
                "note": "call back",
                "last_modified": "2024-01-01T00:00:00Z",
                "deleted": false
            })
        );
    }

    #[test]
    fn users_listing_accepts_both_forms() {
        let bare: UsersListing = decode_json(br#"[{"id":"a","label":"Ann"}]"#).unwrap();
        assert_eq!(bare.into_users()[0].id, "a");

        let wrapped: UsersListing =
            decode_json(br#"{"users":[{"id":"b","label":null,"consent":{"x":1}}]}"#).unwrap();
        let users = wrapped.into_users();
        assert_eq!(users[0].id, "b");
        assert_eq!(users[0].label, None);
        assert_eq!(users[0].extra["consent"], json!({"x": 1}));
    }

    #[test]
    fn users_listing_object_without_users_is_empty() {
        let listing: UsersListing = decode_json(br#"{"error":"nope"}"#).unwrap();
        assert!(listing.into_users().is_empty());
    }

    #[test]
    fn entries_listing_tolerates_missing_fields() {
        let listing: EntriesListing = decode_json(
            br#"{"entries":[{"id":"e","ts":"2024-01-02T00:00:00Z","last_modified":null}]}"#,
        )
        .unwrap();
        let entries = listing.into_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].modified_at(), "2024-01-02T00:00:00Z");
        assert!(!entries[0].deleted);
        assert_eq!(entries[0].user_id, None);
    }

    #[test]
    fn ack_without_ids_is_empty() {
        let ack: SyncAck = decode_json(br#"{"status":"ok"}"#).unwrap();
        assert!(ack.synced_entry_ids.is_empty());
    }

    #[test]
    fn malformed_body_is_reported() {
        let result: ProtocolResult<SyncAck> = decode_json(b"{not json");
        assert!(matches!(result, Err(ProtocolError::MalformedJson(_))));
    }

    #[test]
    fn mobile_request_shape() {
        let request = MobileSyncRequest {
            user: MobileUser {
                id: "dev-1".into(),
                label: "CLEODOC User".into(),
                consent: Consent {
                    share_with_professional: true,
                },
            },
            entries: Vec::new(),
        };
        let value: serde_json::Value = decode_json(&encode_json(&request).unwrap()).unwrap();
        assert_eq!(value["user"]["consent"]["share_with_professional"], json!(true));
        assert_eq!(value["entries"], json!([]));
    }
}
