//! Endpoint paths and URL construction.

use crate::error::{ProtocolError, ProtocolResult};
use url::Url;

/// Dashboard: full user listing.
pub const USERS_PATH: &str = "/api/central/users";
/// Dashboard: incremental entry listing for one user.
pub const ENTRIES_PATH: &str = "/api/central/entries";
/// Dashboard: per-user entry upload.
pub const SYNC_ENTRIES_PATH: &str = "/api/central/sync_entries";
/// Mobile: entry upload for the device's own user.
pub const MOBILE_SYNC_PATH: &str = "/api/cleodoc/sync";
/// Mobile: incremental pull of the device's own entries.
pub const MOBILE_PULL_PATH: &str = "/api/cleodoc/pull";
/// Header carrying the mobile channel's shared secret.
pub const MOBILE_KEY_HEADER: &str = "X-MOBILE-KEY";

/// Joins a base URL (without trailing slash) and an absolute path.
pub fn resolve(base_url: &str, path: &str) -> ProtocolResult<String> {
    parse(&format!("{}{}", base_url, path)).map(String::from)
}

/// Builds `GET /api/central/entries?user_id=..[&since=..]&include_deleted=1&limit=..`.
///
/// `since` is omitted entirely on a first pull. Deleted rows are always
/// requested so soft deletes reach the dashboard cache. The backend
/// returns at most `limit` rows, newest `ts` first.
pub fn entries_url(
    base_url: &str,
    user_id: &str,
    since: Option<&str>,
    limit: usize,
) -> ProtocolResult<String> {
    let mut url = parse(&format!("{}{}", base_url, ENTRIES_PATH))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("user_id", user_id);
        if let Some(since) = since {
            query.append_pair("since", since);
        }
        query.append_pair("include_deleted", "1");
        query.append_pair("limit", &limit.to_string());
    }
    Ok(url.into())
}

/// Builds `GET /api/cleodoc/pull?user_id=..&since=..`; this endpoint
/// always requires `since`.
pub fn mobile_pull_url(base_url: &str, user_id: &str, since: &str) -> ProtocolResult<String> {
    let mut url = parse(&format!("{}{}", base_url, MOBILE_PULL_PATH))?;
    url.query_pairs_mut()
        .append_pair("user_id", user_id)
        .append_pair("since", since);
    Ok(url.into())
}

fn parse(raw: &str) -> ProtocolResult<Url> {
    Url::parse(raw).map_err(|e| ProtocolError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}
