//! Scalar types shared by every entity.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ISO-8601 timestamp kept as its string form.
///
/// Ordering is plain string ordering. For fixed-width, UTC-normalized
/// values (`YYYY-MM-DDTHH:MM:SS[.fff]Z`) that is chronological order, which
/// is all cursor advancement and display ordering rely on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Textual form of [`Timestamp::epoch`].
    pub const EPOCH: &'static str = "1970-01-01T00:00:00Z";

    /// Wraps an ISO-8601 string as-is.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The "beginning of time" sentinel.
    pub fn epoch() -> Self {
        Self(Self::EPOCH.to_string())
    }

    /// Current UTC time with millisecond precision and a `Z` suffix.
    pub fn now() -> Self {
        Self(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Current UTC time, or the earliest instant strictly after `previous`
    /// when the clock has not moved past it.
    ///
    /// A `previous` that is not RFC 3339 cannot be stepped and yields the
    /// later of the two.
    pub fn now_after(previous: &Timestamp) -> Self {
        let now = Self::now();
        if now > *previous {
            return now;
        }
        let Ok(parsed) = DateTime::parse_from_rfc3339(previous.as_str()) else {
            return now.max_with(previous.clone());
        };
        let parsed = parsed.with_timezone(&Utc);
        let millis = Self((parsed + Duration::milliseconds(1)).to_rfc3339_opts(SecondsFormat::Millis, true));
        if millis > *previous {
            return millis;
        }
        // "...:00.001Z" sorts before "...:00Z"; step a whole second instead.
        Self((parsed + Duration::seconds(1)).to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// Returns the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the later of two timestamps.
    #[must_use]
    pub fn max_with(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Timestamp {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Timestamp {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Whether a local row has been accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Created or changed locally, not yet acknowledged.
    Pending,
    /// Acknowledged by (or pulled from) the backend.
    Synced,
}

impl SyncStatus {
    /// Wire/display name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }
}

/// Generates a client-side identifier (UUIDv4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
