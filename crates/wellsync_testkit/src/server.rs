//! In-process fake of the central backend.
//!
//! [`CentralServer`] answers the same HTTP contract as the real backend
//! through [`LoopbackServer`], so transports and engines can be tested
//! end to end without a network. Uploads are upserts by id: an incoming
//! row is stored and acknowledged only when its `last_modified` is
//! strictly newer than the stored copy, so re-sending a version the
//! server already holds is neither stored nor acknowledged.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use url::Url;
use wellsync_protocol::{
    decode_json, EntryPayload, HttpRequest, HttpResponse, LoopbackServer, Method,
    MobileSyncRequest, RemoteEntry, RemoteUser, SyncAck, SyncEntriesRequest, ENTRIES_PATH,
    JSON_CONTENT_TYPE, MOBILE_KEY_HEADER, MOBILE_PULL_PATH, MOBILE_SYNC_PATH, SYNC_ENTRIES_PATH,
    USERS_PATH,
};

/// Shared secret accepted by default.
pub const TEST_MOBILE_KEY: &str = "mobilesetup";

/// Rows returned by the entry listing when no `limit` is given.
pub const DEFAULT_ENTRIES_LIMIT: usize = 500;

/// A one-shot failure applied to the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// No response at all.
    ConnectionRefused,
    /// A non-2xx status with a plain-text body.
    Status(u16, String),
    /// `200` with an HTML body, as a captive portal would send.
    NonJson,
    /// `200`, JSON content type, truncated body.
    MalformedJson,
    /// Process the upload but neither store nor acknowledge these ids.
    WithholdAck(Vec<String>),
}

/// A request as the server saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Method.
    pub method: Method,
    /// URL path.
    pub path: String,
    /// Decoded query parameters.
    pub query: BTreeMap<String, String>,
    /// Value of the mobile key header, if sent.
    pub mobile_key: Option<String>,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<String, RemoteUser>,
    entries: BTreeMap<String, RemoteEntry>,
    requests: Vec<RecordedRequest>,
    faults: VecDeque<Fault>,
    wrapped_listings: bool,
}

/// Fake central backend.
#[derive(Debug)]
pub struct CentralServer {
    mobile_key: String,
    state: Mutex<State>,
}

impl Default for CentralServer {
    fn default() -> Self {
        Self::new()
    }
}

impl CentralServer {
    /// A server expecting [`TEST_MOBILE_KEY`].
    pub fn new() -> Self {
        Self::with_mobile_key(TEST_MOBILE_KEY)
    }

    /// A server expecting `key` on the mobile channel.
    pub fn with_mobile_key(key: impl Into<String>) -> Self {
        Self {
            mobile_key: key.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Adds or replaces a user.
    pub fn seed_user(&self, user: RemoteUser) {
        self.state.lock().users.insert(user.id.clone(), user);
    }

    /// Adds or replaces an entry owned by `user_id`.
    pub fn seed_entry(&self, user_id: &str, mut entry: RemoteEntry) {
        entry.user_id = Some(user_id.to_string());
        self.state.lock().entries.insert(entry.id.clone(), entry);
    }

    /// Serves listings as `{ "users": [...] }` / `{ "entries": [...] }`
    /// instead of bare arrays.
    pub fn set_wrapped_listings(&self, wrapped: bool) {
        self.state.lock().wrapped_listings = wrapped;
    }

    /// Queues a fault for the next request.
    pub fn fail_next(&self, fault: Fault) {
        self.state.lock().faults.push_back(fault);
    }

    /// Stored users, ordered by id.
    pub fn users(&self) -> Vec<RemoteUser> {
        self.state.lock().users.values().cloned().collect()
    }

    /// A stored entry.
    pub fn entry(&self, id: &str) -> Option<RemoteEntry> {
        self.state.lock().entries.get(id).cloned()
    }

    /// Every stored entry of `user_id`, deleted ones included.
    pub fn entries_for(&self, user_id: &str) -> Vec<RemoteEntry> {
        self.state
            .lock()
            .entries
            .values()
            .filter(|e| e.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect()
    }

    /// Requests received, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    fn authorized(&self, request: &HttpRequest) -> bool {
        !self.mobile_key.is_empty() && request.header(MOBILE_KEY_HEADER) == Some(self.mobile_key.as_str())
    }

    fn route(
        &self,
        state: &mut State,
        request: &HttpRequest,
        path: &str,
        query: &BTreeMap<String, String>,
        withheld: &BTreeSet<String>,
    ) -> HttpResponse {
        match (request.method, path) {
            (Method::Get, USERS_PATH) => {
                let users: Vec<&RemoteUser> = state.users.values().collect();
                if state.wrapped_listings {
                    json_response(200, &json!({ "users": users }))
                } else {
                    json_response(200, &users)
                }
            }
            (Method::Get, ENTRIES_PATH) => {
                let Some(user_id) = query.get("user_id").filter(|u| !u.is_empty()) else {
                    return error_response(400, "user_id is required");
                };
                let include_deleted = query
                    .get("include_deleted")
                    .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
                let limit = match query.get("limit").map(|l| l.parse::<usize>()) {
                    None => DEFAULT_ENTRIES_LIMIT,
                    Some(Ok(limit)) => limit,
                    Some(Err(_)) => return error_response(400, "limit must be an integer"),
                };
                let mut rows = select(state, user_id, query.get("since").map(String::as_str));
                rows.retain(|e| include_deleted || !e.deleted);
                rows.sort_by(|a, b| b.ts.cmp(&a.ts));
                rows.truncate(limit);
                if state.wrapped_listings {
                    json_response(200, &json!({ "entries": rows }))
                } else {
                    json_response(200, &rows)
                }
            }
            (Method::Post, SYNC_ENTRIES_PATH) => {
                let upload: SyncEntriesRequest = match decode_body(request) {
                    Ok(upload) => upload,
                    Err(response) => return response,
                };
                let user_id = upload.user.id.trim();
                if user_id.is_empty() {
                    return error_response(400, "user.id is required");
                }
                state.users.entry(user_id.to_string()).or_insert_with(|| RemoteUser {
                    id: user_id.to_string(),
                    label: None,
                    extra: BTreeMap::new(),
                });
                let acked = apply_upload(state, user_id, &upload.entries, withheld);
                json_response(200, &SyncAck::new(acked))
            }
            (Method::Post, MOBILE_SYNC_PATH) => {
                if !self.authorized(request) {
                    return error_response(401, "unauthorized");
                }
                let upload: MobileSyncRequest = match decode_body(request) {
                    Ok(upload) => upload,
                    Err(response) => return response,
                };
                let user_id = upload.user.id.trim();
                if user_id.is_empty() {
                    return error_response(400, "user.id required");
                }
                let mut extra = BTreeMap::new();
                extra.insert("consent".to_string(), json!(upload.user.consent));
                state.users.insert(
                    user_id.to_string(),
                    RemoteUser {
                        id: user_id.to_string(),
                        label: Some(upload.user.label.clone()),
                        extra,
                    },
                );
                let acked = apply_upload(state, user_id, &upload.entries, withheld);
                json_response(200, &SyncAck::new(acked))
            }
            (Method::Get, MOBILE_PULL_PATH) => {
                if !self.authorized(request) {
                    return error_response(401, "unauthorized");
                }
                let user_id = query.get("user_id").filter(|u| !u.is_empty());
                let since = query.get("since").filter(|s| !s.is_empty());
                let (Some(user_id), Some(since)) = (user_id, since) else {
                    return error_response(400, "user_id and since required");
                };
                let rows = select(state, user_id, Some(since.as_str()));
                json_response(200, &json!({ "entries": rows }))
            }
            _ => error_response(404, "not found"),
        }
    }
}

impl LoopbackServer for CentralServer {
    fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let url = Url::parse(&request.url).map_err(|e| e.to_string())?;
        let query: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        let body = request
            .body
            .as_deref()
            .and_then(|b| serde_json::from_slice(b).ok());

        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            method: request.method,
            path: url.path().to_string(),
            query: query.clone(),
            mobile_key: request.header(MOBILE_KEY_HEADER).map(String::from),
            body,
        });

        let withheld = match state.faults.pop_front() {
            None => BTreeSet::new(),
            Some(Fault::ConnectionRefused) => return Err("connection refused".into()),
            Some(Fault::Status(status, body)) => {
                return Ok(HttpResponse::raw(status, Some("text/plain"), body));
            }
            Some(Fault::NonJson) => {
                return Ok(HttpResponse::raw(
                    200,
                    Some("text/html; charset=utf-8"),
                    "<html><body>Sign in to continue</body></html>",
                ));
            }
            Some(Fault::MalformedJson) => {
                return Ok(HttpResponse::raw(200, Some(JSON_CONTENT_TYPE), r#"{"entries": [{"id": "#));
            }
            Some(Fault::WithholdAck(ids)) => ids.into_iter().collect(),
        };

        Ok(self.route(&mut state, request, url.path(), &query, &withheld))
    }
}

fn select(state: &State, user_id: &str, since: Option<&str>) -> Vec<RemoteEntry> {
    state
        .entries
        .values()
        .filter(|e| e.user_id.as_deref() == Some(user_id))
        .filter(|e| since.map_or(true, |since| e.modified_at() > since))
        .cloned()
        .collect()
}

fn apply_upload(
    state: &mut State,
    user_id: &str,
    entries: &[EntryPayload],
    withheld: &BTreeSet<String>,
) -> Vec<String> {
    let mut acked = Vec::new();
    for payload in entries {
        let id = payload.id.trim();
        if id.is_empty() || withheld.contains(id) {
            continue;
        }
        if let Some(existing) = state.entries.get(id) {
            if existing.modified_at() >= payload.last_modified.as_str() {
                continue;
            }
        }
        state.entries.insert(
            id.to_string(),
            RemoteEntry {
                id: id.to_string(),
                user_id: Some(user_id.to_string()),
                ts: payload.ts.clone(),
                mood: payload.mood,
                stress: payload.stress,
                note: payload.note.clone(),
                last_modified: Some(payload.last_modified.clone()),
                deleted: payload.deleted,
            },
        );
        acked.push(id.to_string());
    }
    acked
}

fn decode_body<T: serde::de::DeserializeOwned>(request: &HttpRequest) -> Result<T, HttpResponse> {
    let body = request.body.as_deref().unwrap_or_default();
    decode_json(body).map_err(|e| error_response(400, &e.to_string()))
}

fn json_response<T: Serialize>(status: u16, body: &T) -> HttpResponse {
    HttpResponse::json(status, body)
        .unwrap_or_else(|e| HttpResponse::raw(500, Some("text/plain"), e.to_string()))
}

fn error_response(status: u16, message: &str) -> HttpResponse {
    json_response(status, &json!({ "error": message }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::remote_entry;

    const BASE: &str = "http://central.test";

    fn upload(user: &str, id: &str, modified: &str) -> HttpRequest {
        let request = SyncEntriesRequest {
            user: wellsync_protocol::UserRef { id: user.into() },
            entries: vec![EntryPayload {
                id: id.into(),
                ts: modified.into(),
                mood: None,
                stress: None,
                note: Some("n".into()),
                last_modified: modified.into(),
                deleted: false,
            }],
        };
        HttpRequest::post_json(format!("{BASE}{SYNC_ENTRIES_PATH}"), &request).unwrap()
    }

    fn ack(response: HttpResponse) -> Vec<String> {
        decode_json::<SyncAck>(&response.body).unwrap().synced_entry_ids
    }

    #[test]
    fn upload_stores_only_strictly_newer_versions() {
        let server = CentralServer::new();

        assert_eq!(ack(server.handle(&upload("u1", "e1", "2024-01-02T00:00:00Z")).unwrap()), vec!["e1"]);
        assert!(ack(server.handle(&upload("u1", "e1", "2024-01-02T00:00:00Z")).unwrap()).is_empty());
        assert!(ack(server.handle(&upload("u1", "e1", "2024-01-01T00:00:00Z")).unwrap()).is_empty());
        assert_eq!(ack(server.handle(&upload("u1", "e1", "2024-01-03T00:00:00Z")).unwrap()), vec!["e1"]);

        assert_eq!(
            server.entry("e1").unwrap().last_modified.as_deref(),
            Some("2024-01-03T00:00:00Z")
        );
        assert_eq!(server.users().len(), 1);
    }

    #[test]
    fn entries_listing_filters_since_and_deleted() {
        let server = CentralServer::new();
        server.seed_entry("u1", remote_entry("old", "2024-01-01T00:00:00Z"));
        server.seed_entry("u1", remote_entry("new", "2024-01-05T00:00:00Z"));
        let mut gone = remote_entry("gone", "2024-01-06T00:00:00Z");
        gone.deleted = true;
        server.seed_entry("u1", gone);

        let url = format!("{BASE}{ENTRIES_PATH}?user_id=u1&since=2024-01-02T00%3A00%3A00Z");
        let response = server.handle(&HttpRequest::get(url)).unwrap();
        let rows: Vec<RemoteEntry> = decode_json(&response.body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "new");
        assert_eq!(server.requests()[0].query["since"], "2024-01-02T00:00:00Z");

        let url = format!("{BASE}{ENTRIES_PATH}?user_id=u1&include_deleted=true");
        let response = server.handle(&HttpRequest::get(url)).unwrap();
        let rows: Vec<RemoteEntry> = decode_json(&response.body).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().any(|e| e.id == "gone" && e.deleted));
    }

    #[test]
    fn entries_listing_honours_limit_newest_ts_first() {
        let server = CentralServer::new();
        server.seed_entry("u1", remote_entry("a", "2024-01-01T00:00:00Z"));
        server.seed_entry("u1", remote_entry("b", "2024-01-02T00:00:00Z"));
        server.seed_entry("u1", remote_entry("c", "2024-01-03T00:00:00Z"));

        let url = format!("{BASE}{ENTRIES_PATH}?user_id=u1&limit=2");
        let response = server.handle(&HttpRequest::get(url)).unwrap();
        let rows: Vec<RemoteEntry> = decode_json(&response.body).unwrap();
        let ids: Vec<&str> = rows.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        let bad = format!("{BASE}{ENTRIES_PATH}?user_id=u1&limit=lots");
        assert_eq!(server.handle(&HttpRequest::get(bad)).unwrap().status, 400);
    }

    #[test]
    fn mobile_channel_requires_key() {
        let server = CentralServer::new();
        let url = format!("{BASE}{MOBILE_PULL_PATH}?user_id=u1&since=1970-01-01T00%3A00%3A00Z");

        let denied = server.handle(&HttpRequest::get(url.clone())).unwrap();
        assert_eq!(denied.status, 401);

        let allowed = server
            .handle(&HttpRequest::get(url).with_header(MOBILE_KEY_HEADER, TEST_MOBILE_KEY))
            .unwrap();
        assert_eq!(allowed.status, 200);
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn faults_apply_once() {
        let server = CentralServer::new();
        server.fail_next(Fault::ConnectionRefused);
        server.fail_next(Fault::Status(503, "maintenance".into()));

        let url = format!("{BASE}{USERS_PATH}");
        assert!(server.handle(&HttpRequest::get(url.clone())).is_err());
        assert_eq!(server.handle(&HttpRequest::get(url.clone())).unwrap().status, 503);
        assert!(server.handle(&HttpRequest::get(url)).unwrap().is_json());
    }

    #[test]
    fn withheld_ids_are_neither_stored_nor_acknowledged() {
        let server = CentralServer::new();
        server.fail_next(Fault::WithholdAck(vec!["e1".into()]));

        assert!(ack(server.handle(&upload("u1", "e1", "2024-01-02T00:00:00Z")).unwrap()).is_empty());
        assert!(server.entry("e1").is_none());
    }

    #[test]
    fn unknown_path_is_not_found() {
        let server = CentralServer::new();
        let response = server.handle(&HttpRequest::get(format!("{BASE}/nope"))).unwrap();
        assert_eq!(response.status, 404);
    }
}
