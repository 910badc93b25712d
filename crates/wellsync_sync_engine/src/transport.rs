//! Transport layer abstraction for the central backend.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use wellsync_protocol::{MobileSyncRequest, RemoteEntry, RemoteUser, SyncAck, SyncEntriesRequest};

/// The calls the sync flows make against the central backend.
///
/// Implementations never retry; a failed call is reported once and the
/// caller decides when to run the flow again.
pub trait CentralTransport: Send + Sync {
    /// `GET /api/central/users`.
    fn fetch_users(&self) -> SyncResult<Vec<RemoteUser>>;

    /// `GET /api/central/entries`, deleted rows included; `since` is
    /// omitted on a first pull.
    fn fetch_entries(&self, user_id: &str, since: Option<&str>) -> SyncResult<Vec<RemoteEntry>>;

    /// `POST /api/central/sync_entries`.
    fn push_entries(&self, request: &SyncEntriesRequest) -> SyncResult<SyncAck>;

    /// `POST /api/cleodoc/sync` on the mobile channel.
    fn push_mobile(&self, request: &MobileSyncRequest) -> SyncResult<SyncAck>;

    /// `GET /api/cleodoc/pull` on the mobile channel.
    fn pull_mobile(&self, user_id: &str, since: &str) -> SyncResult<Vec<RemoteEntry>>;
}

/// Which side of a [`MockTransport`] a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    /// [`CentralTransport::fetch_users`]
    FetchUsers,
    /// [`CentralTransport::fetch_entries`]
    FetchEntries,
    /// [`CentralTransport::push_entries`]
    PushEntries,
    /// [`CentralTransport::push_mobile`]
    PushMobile,
    /// [`CentralTransport::pull_mobile`]
    PullMobile,
}

/// A scripted transport for testing.
///
/// Pushes acknowledge every entry they carry unless an explicit
/// acknowledgement is scripted.
#[derive(Debug, Default)]
pub struct MockTransport {
    offline: AtomicBool,
    fail_status: Mutex<Option<(u16, String)>>,
    users: Mutex<Vec<RemoteUser>>,
    entries: Mutex<Vec<RemoteEntry>>,
    ack: Mutex<Option<SyncAck>>,
    calls: Mutex<Vec<MockCall>>,
    pushed: Mutex<Vec<SyncEntriesRequest>>,
    mobile_pushed: Mutex<Vec<MobileSyncRequest>>,
    since_seen: Mutex<Vec<Option<String>>>,
    call_count: AtomicUsize,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the users returned by the listing.
    pub fn set_users(&self, users: Vec<RemoteUser>) {
        *self.users.lock() = users;
    }

    /// Sets the entries returned by both pull calls.
    pub fn set_entries(&self, entries: Vec<RemoteEntry>) {
        *self.entries.lock() = entries;
    }

    /// Scripts the acknowledgement of the next pushes.
    pub fn set_ack(&self, ack: SyncAck) {
        *self.ack.lock() = Some(ack);
    }

    /// Simulates a connection-level failure on every call.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes every call answer with `status` and `body`.
    pub fn set_failure(&self, status: u16, body: impl Into<String>) {
        *self.fail_status.lock() = Some((status, body.into()));
    }

    /// Clears a scripted failure.
    pub fn clear_failure(&self) {
        *self.fail_status.lock() = None;
    }

    /// Total number of calls made.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Calls made, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Dashboard upload requests received.
    pub fn pushed(&self) -> Vec<SyncEntriesRequest> {
        self.pushed.lock().clone()
    }

    /// Mobile upload requests received.
    pub fn mobile_pushed(&self) -> Vec<MobileSyncRequest> {
        self.mobile_pushed.lock().clone()
    }

    /// `since` values sent by pulls, in order.
    pub fn since_seen(&self) -> Vec<Option<String>> {
        self.since_seen.lock().clone()
    }

    fn enter(&self, call: MockCall) -> SyncResult<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(call);
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Network("connection refused".into()));
        }
        if let Some((status, body)) = self.fail_status.lock().clone() {
            return Err(SyncError::transport(status, body.as_bytes(), 250));
        }
        Ok(())
    }

    fn ack_for<'a>(&self, ids: impl Iterator<Item = &'a str>) -> SyncAck {
        self.ack.lock().clone().unwrap_or_else(|| SyncAck::new(ids))
    }
}

impl CentralTransport for MockTransport {
    fn fetch_users(&self) -> SyncResult<Vec<RemoteUser>> {
        self.enter(MockCall::FetchUsers)?;
        Ok(self.users.lock().clone())
    }

    fn fetch_entries(&self, user_id: &str, since: Option<&str>) -> SyncResult<Vec<RemoteEntry>> {
        self.enter(MockCall::FetchEntries)?;
        self.since_seen.lock().push(since.map(String::from));
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| e.user_id.as_deref().map_or(true, |u| u == user_id))
            .cloned()
            .collect())
    }

    fn push_entries(&self, request: &SyncEntriesRequest) -> SyncResult<SyncAck> {
        self.enter(MockCall::PushEntries)?;
        self.pushed.lock().push(request.clone());
        Ok(self.ack_for(request.entries.iter().map(|e| e.id.as_str())))
    }

    fn push_mobile(&self, request: &MobileSyncRequest) -> SyncResult<SyncAck> {
        self.enter(MockCall::PushMobile)?;
        self.mobile_pushed.lock().push(request.clone());
        Ok(self.ack_for(request.entries.iter().map(|e| e.id.as_str())))
    }

    fn pull_mobile(&self, user_id: &str, since: &str) -> SyncResult<Vec<RemoteEntry>> {
        self.enter(MockCall::PullMobile)?;
        self.since_seen.lock().push(Some(since.to_string()));
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| e.user_id.as_deref().map_or(true, |u| u == user_id))
            .cloned()
            .collect())
    }
}
