//! Typed metadata keys.

use std::fmt;

const ENTRIES_PREFIX: &str = "since_entries_";
const OWN_ENTRIES_PREFIX: &str = "since_own_entries_";
const SELF_USER_ID: &str = "self_user_id";

/// A resource whose incremental pulls are bounded by a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CursorScope {
    /// Dashboard pull of one user's entries (`/api/central/entries`).
    Entries {
        /// Whose entries.
        user_id: String,
    },
    /// Mobile pull of the device's own entries (`/api/cleodoc/pull`).
    OwnEntries {
        /// The device's user.
        user_id: String,
    },
}

impl CursorScope {
    /// Dashboard scope for `user_id`.
    pub fn entries(user_id: impl Into<String>) -> Self {
        Self::Entries {
            user_id: user_id.into(),
        }
    }

    /// Mobile scope for `user_id`.
    pub fn own_entries(user_id: impl Into<String>) -> Self {
        Self::OwnEntries {
            user_id: user_id.into(),
        }
    }

    /// The user this scope belongs to.
    pub fn user_id(&self) -> &str {
        match self {
            Self::Entries { user_id } | Self::OwnEntries { user_id } => user_id,
        }
    }
}

/// Every key the metadata collection may hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetaKey {
    /// Newest `last_modified` pulled for a scope.
    Cursor(CursorScope),
    /// Id of the device's own profile.
    SelfUserId,
}

impl MetaKey {
    /// Stable storage key, e.g. `since_entries_<user_id>`.
    pub fn as_key(&self) -> String {
        match self {
            Self::Cursor(CursorScope::Entries { user_id }) => format!("{ENTRIES_PREFIX}{user_id}"),
            Self::Cursor(CursorScope::OwnEntries { user_id }) => {
                format!("{OWN_ENTRIES_PREFIX}{user_id}")
            }
            Self::SelfUserId => SELF_USER_ID.to_string(),
        }
    }

    /// Parses a storage key back; unknown keys yield `None`.
    pub fn parse(key: &str) -> Option<Self> {
        if key == SELF_USER_ID {
            return Some(Self::SelfUserId);
        }
        if let Some(user_id) = key.strip_prefix(OWN_ENTRIES_PREFIX) {
            return Some(Self::Cursor(CursorScope::own_entries(user_id)));
        }
        key.strip_prefix(ENTRIES_PREFIX)
            .map(|user_id| Self::Cursor(CursorScope::entries(user_id)))
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}
