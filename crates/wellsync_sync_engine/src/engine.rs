//! The sync flows.

use crate::config::SyncConfig;
use crate::convert::{cached_entry, cached_user, entry_payload, note_payload};
use crate::error::{SyncError, SyncResult};
use crate::transport::CentralTransport;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};
use wellsync_core::{
    CursorRegistry, CursorScope, Entry, LocalStore, OutboundQueue, QueuedNote, Timestamp, User,
    WriteBatch,
};
use wellsync_protocol::{Consent, MobileSyncRequest, MobileUser, SyncEntriesRequest, UserRef};

/// Outcome of one pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
    /// Rows in the server's response.
    pub received: usize,
    /// Rows written locally.
    pub applied: usize,
    /// Rows skipped because the local copy was newer.
    pub kept_local: usize,
    /// Queued notes removed because the backend already holds them.
    pub notes_confirmed: usize,
    /// Cursor after the round.
    pub cursor: Timestamp,
    /// Whether the cursor moved.
    pub cursor_advanced: bool,
    /// The response was as long as the requested row limit.
    ///
    /// The backend returns the newest `ts` first, so older changes in the
    /// window may have been cut off while the cursor still moved to the
    /// newest `last_modified`. Raise `SyncConfig::pull_limit` to cover
    /// larger first pulls.
    pub limit_reached: bool,
}

/// Outcome of one push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Items sent.
    pub sent: usize,
    /// Items the backend acknowledged and that were cleared or marked synced.
    pub acknowledged: usize,
    /// Items still waiting after the round.
    pub remaining: usize,
    /// Requests made.
    pub requests: usize,
    /// Items left queued because they name no user.
    pub skipped: usize,
}

/// Counters over completed and failed flows.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Flows that completed.
    pub flows_completed: u64,
    /// Flows that failed.
    pub flows_failed: u64,
    /// User profiles cached.
    pub users_pulled: u64,
    /// Entry rows applied by pulls.
    pub entries_pulled: u64,
    /// Items acknowledged by the backend.
    pub acknowledged: u64,
    /// Completion time of the last successful flow.
    pub last_success: Option<Timestamp>,
    /// Last failure, prefixed with the flow name.
    pub last_error: Option<String>,
}

/// Results of a dashboard round; each flow succeeds or fails on its own.
#[derive(Debug)]
pub struct DashboardRound {
    /// Queued notes upload.
    pub push: SyncResult<PushReport>,
    /// User listing refresh.
    pub users: SyncResult<usize>,
    /// Entry pull for the selected user, if any.
    pub entries: Option<SyncResult<PullReport>>,
}

impl DashboardRound {
    /// Failures of the round, in flow order.
    pub fn errors(&self) -> Vec<&SyncError> {
        let mut errors = Vec::new();
        if let Err(err) = &self.push {
            errors.push(err);
        }
        if let Err(err) = &self.users {
            errors.push(err);
        }
        if let Some(Err(err)) = &self.entries {
            errors.push(err);
        }
        errors
    }
}

/// Results of a mobile round.
#[derive(Debug)]
pub struct MobileRound {
    /// The device's profile.
    pub profile: User,
    /// Pending entries upload.
    pub push: SyncResult<PushReport>,
    /// Pull of the device's own rows.
    pub pull: SyncResult<PullReport>,
}

/// Drives the pull and push flows between a [`LocalStore`] and the
/// central backend.
///
/// Every flow validates the complete server response before touching the
/// store, and writes its rows and its cursor in a single frame. A failed
/// flow leaves the queue, the cursors and the cached rows untouched, so
/// running it again is always safe.
///
/// One round per scope at a time is the caller's responsibility; flows on
/// different scopes may interleave.
pub struct SyncEngine<T: CentralTransport> {
    config: SyncConfig,
    store: Arc<LocalStore>,
    transport: T,
    stats: RwLock<SyncStats>,
}

impl<T: CentralTransport> SyncEngine<T> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, store: Arc<LocalStore>, transport: T) -> Self {
        Self {
            config,
            store,
            transport,
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Gets the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Replaces the cached user profiles with the backend's listing.
    ///
    /// Returns how many profiles were cached.
    pub fn pull_users(&self) -> SyncResult<usize> {
        let result = self.fetch_and_cache_users();
        self.finish("pull_users", result, |count, stats| {
            stats.users_pulled += *count as u64;
        })
    }

    /// Pulls entries of `user_id` changed since its cursor.
    ///
    /// The server is authoritative: returned rows overwrite local ones.
    /// `since` is omitted when the scope was never pulled.
    pub fn pull_entries(&self, user_id: &str) -> SyncResult<PullReport> {
        let result = self.pull_scope(CursorScope::entries(user_id), false);
        self.finish("pull_entries", result, |report, stats| {
            stats.entries_pulled += report.applied as u64;
        })
    }

    /// Uploads queued notes, one request per user, and removes the
    /// acknowledged ones.
    ///
    /// An empty queue makes no request. Notes the server does not list
    /// stay queued for the next round.
    pub fn push_queued(&self) -> SyncResult<PushReport> {
        let result = self.upload_queue();
        self.finish("push_queued", result, |report, stats| {
            stats.acknowledged += report.acknowledged as u64;
        })
    }

    /// Uploads up to one page of `profile`'s pending entries over the
    /// mobile channel and marks the acknowledged ones `synced`.
    pub fn push_pending_entries(&self, profile: &User) -> SyncResult<PushReport> {
        let result = self.upload_pending(profile);
        self.finish("push_pending_entries", result, |report, stats| {
            stats.acknowledged += report.acknowledged as u64;
        })
    }

    /// Pulls the device's own rows over the mobile channel.
    ///
    /// Last write wins: a local row with a newer `last_modified` is kept.
    pub fn pull_own_entries(&self, user_id: &str) -> SyncResult<PullReport> {
        let result = self.pull_scope(CursorScope::own_entries(user_id), true);
        self.finish("pull_own_entries", result, |report, stats| {
            stats.entries_pulled += report.applied as u64;
        })
    }

    /// Dashboard round: push queued notes, refresh users, then pull the
    /// selected user's entries.
    pub fn sync_dashboard(&self, user_id: Option<&str>) -> DashboardRound {
        DashboardRound {
            push: self.push_queued(),
            users: self.pull_users(),
            entries: user_id.map(|id| self.pull_entries(id)),
        }
    }

    /// Mobile round: push pending entries, then pull the device's own rows.
    pub fn sync_mobile(&self) -> SyncResult<MobileRound> {
        let profile = self.store.get_or_create_self_profile(&self.config.user_label)?;
        let push = self.push_pending_entries(&profile);
        let pull = self.pull_own_entries(&profile.id);
        Ok(MobileRound { profile, push, pull })
    }

    fn fetch_and_cache_users(&self) -> SyncResult<usize> {
        let remote = self.transport.fetch_users()?;
        let users: Vec<User> = remote.iter().map(cached_user).collect();
        self.store.cache_users(&users)?;
        Ok(users.len())
    }

    fn pull_scope(&self, scope: CursorScope, keep_newer_local: bool) -> SyncResult<PullReport> {
        let cursors = CursorRegistry::new(&self.store);
        let user_id = scope.user_id().to_string();

        let (remote, limit) = match &scope {
            CursorScope::Entries { .. } => {
                let since = cursors.read_raw(&scope)?;
                let rows = self
                    .transport
                    .fetch_entries(&user_id, since.as_ref().map(Timestamp::as_str))?;
                (rows, Some(self.config.pull_limit))
            }
            CursorScope::OwnEntries { .. } => {
                let since = cursors.read(&scope)?;
                (self.transport.pull_mobile(&user_id, since.as_str())?, None)
            }
        };

        let mut batch = WriteBatch::new();
        let mut applied = 0;
        let mut kept_local = 0;
        for row in &remote {
            let incoming = cached_entry(row, &user_id);
            if keep_newer_local {
                if let Some(local) = self.store.get::<Entry>(&incoming.id)? {
                    if local.last_modified > incoming.last_modified {
                        kept_local += 1;
                        continue;
                    }
                }
            }
            batch.put(&incoming)?;
            applied += 1;
        }

        let mut notes_confirmed = 0;
        for row in &remote {
            if let Some(note) = self.store.get::<QueuedNote>(&row.id)? {
                let version = note.last_modified.as_ref().unwrap_or(&note.ts);
                if row.modified_at() >= version.as_str() {
                    batch.delete::<QueuedNote>(note.id);
                    notes_confirmed += 1;
                }
            }
        }

        let newest = remote.iter().map(|row| Timestamp::new(row.modified_at())).max();
        let (cursor, cursor_advanced) = match newest {
            Some(newest) if cursors.stage_advance(&mut batch, &scope, &newest)? => (newest, true),
            _ => (cursors.read(&scope)?, false),
        };
        self.store.commit(batch)?;

        let limit_reached = limit.is_some_and(|limit| remote.len() >= limit);
        if limit_reached {
            warn!(
                user_id = %user_id,
                rows = remote.len(),
                "entry pull hit the row limit; older changes in this window may be missing"
            );
        }

        let report = PullReport {
            received: remote.len(),
            applied,
            kept_local,
            notes_confirmed,
            cursor,
            cursor_advanced,
            limit_reached,
        };
        info!(
            user_id = %user_id,
            received = report.received,
            applied = report.applied,
            kept_local = report.kept_local,
            notes_confirmed = report.notes_confirmed,
            cursor = %report.cursor,
            "pulled entries"
        );
        Ok(report)
    }

    fn upload_queue(&self) -> SyncResult<PushReport> {
        let queue = OutboundQueue::new(&self.store);
        let queued = queue.list_queued()?;
        if queued.is_empty() {
            return Ok(PushReport::default());
        }

        let mut partitions: BTreeMap<&str, Vec<&QueuedNote>> = BTreeMap::new();
        let mut skipped = 0;
        for note in &queued {
            if note.user_id.trim().is_empty() {
                warn!(note_id = %note.id, "queued note names no user; leaving it queued");
                skipped += 1;
                continue;
            }
            partitions.entry(note.user_id.as_str()).or_default().push(note);
        }

        let professional = self.config.professional.as_deref();
        let mut acknowledged = BTreeSet::new();
        for (user_id, notes) in &partitions {
            let request = SyncEntriesRequest {
                user: UserRef {
                    id: user_id.to_string(),
                },
                entries: notes.iter().map(|n| note_payload(n, professional)).collect(),
            };
            let ack = self.transport.push_entries(&request)?;

            let sent: BTreeSet<&str> = notes.iter().map(|n| n.id.as_str()).collect();
            acknowledged.extend(
                ack.synced_entry_ids
                    .into_iter()
                    .filter(|id| sent.contains(id.as_str())),
            );
        }

        let ids: Vec<String> = acknowledged.into_iter().collect();
        let cleared = queue.clear(&ids)?;
        let report = PushReport {
            sent: queued.len() - skipped,
            acknowledged: cleared,
            remaining: queue.len(),
            requests: partitions.len(),
            skipped,
        };
        info!(
            sent = report.sent,
            acknowledged = report.acknowledged,
            remaining = report.remaining,
            "pushed queued notes"
        );
        Ok(report)
    }

    fn upload_pending(&self, profile: &User) -> SyncResult<PushReport> {
        let pending = self
            .store
            .pending_entries_for_user(&profile.id, self.config.pending_page_size)?;
        if pending.is_empty() {
            return Ok(PushReport::default());
        }

        let request = MobileSyncRequest {
            user: MobileUser {
                id: profile.id.clone(),
                label: profile
                    .label
                    .clone()
                    .unwrap_or_else(|| self.config.user_label.clone()),
                consent: Consent {
                    share_with_professional: true,
                },
            },
            entries: pending.iter().map(entry_payload).collect(),
        };
        let ack = self.transport.push_mobile(&request)?;

        let sent: BTreeSet<&str> = pending.iter().map(|e| e.id.as_str()).collect();
        let acked: Vec<&str> = ack
            .synced_entry_ids
            .iter()
            .map(String::as_str)
            .filter(|id| sent.contains(id))
            .collect();
        let marked = self.store.mark_synced(&acked)?;

        let report = PushReport {
            sent: pending.len(),
            acknowledged: marked,
            remaining: self
                .store
                .pending_entries_for_user(&profile.id, usize::MAX)?
                .len(),
            requests: 1,
            skipped: 0,
        };
        info!(
            user_id = %profile.id,
            sent = report.sent,
            acknowledged = report.acknowledged,
            remaining = report.remaining,
            "pushed pending entries"
        );
        Ok(report)
    }

    fn finish<R>(
        &self,
        flow: &'static str,
        result: SyncResult<R>,
        record: impl FnOnce(&R, &mut SyncStats),
    ) -> SyncResult<R> {
        let mut stats = self.stats.write();
        match &result {
            Ok(report) => {
                stats.flows_completed += 1;
                stats.last_success = Some(Timestamp::now());
                record(report, &mut *stats);
            }
            Err(err) => {
                stats.flows_failed += 1;
                stats.last_error = Some(format!("{flow}: {err}"));
                warn!(flow, error = %err, "sync flow failed");
            }
        }
        result
    }
}
