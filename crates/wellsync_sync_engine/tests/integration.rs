//! End-to-end tests: engine, HTTP transport and the fake central backend.

use proptest::prelude::*;
use std::sync::Arc;
use wellsync_core::{CursorRegistry, CursorScope, Entry, NewEntry, OutboundQueue, SyncStatus, Timestamp};
use wellsync_protocol::{Method, MOBILE_PULL_PATH, MOBILE_SYNC_PATH, SYNC_ENTRIES_PATH};
use wellsync_sync_engine::{HttpTransport, LoopbackClient, SyncConfig, SyncEngine, SyncError};
use wellsync_testkit::prelude::*;

type LoopbackEngine = SyncEngine<HttpTransport<LoopbackClient<Arc<CentralServer>>>>;

fn engine_for(server: &Arc<CentralServer>, store: &TestStore, config: SyncConfig) -> LoopbackEngine {
    let transport = HttpTransport::new(&config, LoopbackClient::new(Arc::clone(server)));
    SyncEngine::new(config, Arc::clone(&store.store), transport)
}

fn dashboard(server: &Arc<CentralServer>, store: &TestStore) -> LoopbackEngine {
    engine_for(
        server,
        store,
        SyncConfig::new("http://central.test/").with_professional("dr@example.com"),
    )
}

#[test]
fn dashboard_round_trip() {
    let server = Arc::new(CentralServer::new());
    server.seed_user(remote_user("u1", "Ann"));
    server.seed_entry("u1", remote_entry("e1", "2024-01-01T00:00:00Z"));
    server.seed_entry("u1", remote_entry("e2", "2024-01-03T00:00:00Z"));

    let store = TestStore::new();
    let engine = dashboard(&server, &store);
    let note = OutboundQueue::new(&store)
        .queue_note("u1", "Call next week")
        .unwrap();

    let round = engine.sync_dashboard(Some("u1"));
    assert!(round.errors().is_empty());
    assert_eq!(round.push.unwrap().acknowledged, 1);
    assert_eq!(round.users.unwrap(), 1);

    let pulled = round.entries.unwrap().unwrap();
    assert_eq!(pulled.received, 3);
    assert_eq!(Some(pulled.cursor), note.last_modified);
    assert!(OutboundQueue::new(&store).is_empty());
    assert_eq!(store.list_cached_users().unwrap()[0].label.as_deref(), Some("Ann"));

    let notes: Vec<_> = server
        .entries_for("u1")
        .into_iter()
        .filter_map(|e| e.note)
        .collect();
    assert_eq!(notes, vec!["[DOCPRO:dr@example.com] Call next week".to_string()]);
}

#[test]
fn first_pull_sends_no_since_then_uses_cursor() {
    let server = Arc::new(CentralServer::new());
    server.seed_entry("u1", remote_entry("e1", "2024-01-01T00:00:00Z"));
    let store = TestStore::new();
    let engine = dashboard(&server, &store);

    engine.pull_entries("u1").unwrap();
    engine.pull_entries("u1").unwrap();

    let requests = server.requests();
    assert!(!requests[0].query.contains_key("since"));
    assert_eq!(requests[1].query["since"], "2024-01-01T00:00:00Z");
    assert!(requests.iter().all(|r| r.mobile_key.is_none()));
}

#[test]
fn malformed_response_leaves_state_untouched() {
    let server = Arc::new(CentralServer::new());
    server.seed_entry("u1", remote_entry("e1", "2024-01-01T00:00:00Z"));
    let store = TestStore::new();
    let engine = dashboard(&server, &store);
    let queue = OutboundQueue::new(&store);
    queue.queue_note("u1", "pending").unwrap();

    server.fail_next(Fault::MalformedJson);
    assert!(matches!(engine.pull_entries("u1"), Err(SyncError::Protocol(_))));
    server.fail_next(Fault::MalformedJson);
    assert!(matches!(engine.push_queued(), Err(SyncError::Protocol(_))));

    assert_eq!(queue.len(), 1);
    assert_eq!(store.count::<Entry>(), 0);
    assert!(CursorRegistry::new(&store)
        .read_raw(&CursorScope::entries("u1"))
        .unwrap()
        .is_none());
}

#[test]
fn transport_failures_are_typed() {
    let server = Arc::new(CentralServer::new());
    let store = TestStore::new();
    let engine = dashboard(&server, &store);

    server.fail_next(Fault::Status(502, "bad gateway".into()));
    match engine.pull_users() {
        Err(SyncError::Transport { status, body }) => {
            assert_eq!(status, 502);
            assert_eq!(body, "bad gateway");
        }
        other => panic!("unexpected {other:?}"),
    }

    server.fail_next(Fault::NonJson);
    assert!(matches!(
        engine.pull_users(),
        Err(SyncError::Transport { status: 200, .. })
    ));

    server.fail_next(Fault::ConnectionRefused);
    let err = engine.pull_users().unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));
    assert!(err.is_offline());

    assert_eq!(engine.stats().flows_failed, 3);
    assert!(engine.pull_users().is_ok());
}

#[test]
fn partial_ack_keeps_remainder_for_next_round() {
    let server = Arc::new(CentralServer::new());
    let store = TestStore::new();
    let engine = dashboard(&server, &store);
    let queue = OutboundQueue::new(&store);
    for (id, text) in [("a", "first"), ("b", "second"), ("c", "third")] {
        queue
            .enqueue(&queued_note(id, "u1", text, "2024-01-01T00:00:00Z"))
            .unwrap();
    }

    server.fail_next(Fault::WithholdAck(vec!["b".into()]));
    let report = engine.push_queued().unwrap();
    assert_eq!(report.acknowledged, 2);
    assert_eq!(report.remaining, 1);
    assert_eq!(queue.list_queued().unwrap()[0].id, "b");

    let report = engine.push_queued().unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.acknowledged, 1);
    assert!(queue.is_empty());

    let uploads: Vec<_> = server
        .requests()
        .into_iter()
        .filter(|r| r.method == Method::Post && r.path == SYNC_ENTRIES_PATH)
        .collect();
    assert_eq!(uploads.len(), 2);
}

#[test]
fn mobile_round_trip() {
    let server = Arc::new(CentralServer::new());
    let store = TestStore::new();
    let engine = engine_for(&server, &store, SyncConfig::new("http://central.test"));

    let profile = store.get_or_create_self_profile("CLEODOC User").unwrap();
    let entry = store
        .insert_entry(NewEntry {
            user_id: profile.id.clone(),
            mood: Some(4),
            stress: Some(1),
            note: Some("slept well".into()),
        })
        .unwrap();

    let round = engine.sync_mobile().unwrap();
    assert_eq!(round.profile, profile);
    assert_eq!(round.push.unwrap().acknowledged, 1);
    let pull = round.pull.unwrap();
    assert_eq!(pull.received, 1);
    assert_eq!(pull.cursor, entry.last_modified);

    let stored = store.get::<Entry>(&entry.id).unwrap().unwrap();
    assert_eq!(stored.sync_status, SyncStatus::Synced);
    assert_eq!(stored.mood, Some(4));

    let users = server.users();
    assert_eq!(users[0].label.as_deref(), Some("CLEODOC User"));
    assert_eq!(users[0].extra["consent"]["share_with_professional"], true);

    let requests = server.requests();
    assert_eq!(requests[0].path, MOBILE_SYNC_PATH);
    assert_eq!(requests[1].path, MOBILE_PULL_PATH);
    assert_eq!(requests[1].query["since"], "1970-01-01T00:00:00Z");
    assert!(requests.iter().all(|r| r.mobile_key.as_deref() == Some(TEST_MOBILE_KEY)));
}

#[test]
fn wrong_mobile_key_is_rejected_without_side_effects() {
    let server = Arc::new(CentralServer::with_mobile_key("other"));
    let store = TestStore::new();
    let engine = engine_for(&server, &store, SyncConfig::new("http://central.test"));
    let profile = store.get_or_create_self_profile("Phone").unwrap();
    store
        .insert_entry(NewEntry {
            user_id: profile.id.clone(),
            ..NewEntry::default()
        })
        .unwrap();

    let err = engine.push_pending_entries(&profile).unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(store.pending_entries(10).unwrap().len(), 1);
}

#[test]
fn pending_upload_is_paged() {
    let server = Arc::new(CentralServer::new());
    let store = TestStore::new();
    let engine = engine_for(
        &server,
        &store,
        SyncConfig::new("http://central.test").with_pending_page_size(2),
    );
    let profile = store.get_or_create_self_profile("Phone").unwrap();
    for mood in 0..3 {
        store
            .insert_entry(NewEntry {
                user_id: profile.id.clone(),
                mood: Some(mood),
                ..NewEntry::default()
            })
            .unwrap();
    }

    let first = engine.push_pending_entries(&profile).unwrap();
    assert_eq!((first.sent, first.remaining), (2, 1));
    let second = engine.push_pending_entries(&profile).unwrap();
    assert_eq!((second.sent, second.remaining), (1, 0));
    assert_eq!(engine.push_pending_entries(&profile).unwrap().sent, 0);
    assert_eq!(server.request_count(), 2);
}

#[test]
fn soft_delete_propagates() {
    let server = Arc::new(CentralServer::new());
    let store = TestStore::new();
    let engine = engine_for(&server, &store, SyncConfig::new("http://central.test"));
    let profile = store.get_or_create_self_profile("Phone").unwrap();
    let entry = store
        .insert_entry(NewEntry {
            user_id: profile.id.clone(),
            ..NewEntry::default()
        })
        .unwrap();
    engine.push_pending_entries(&profile).unwrap();

    store.soft_delete_entry(&entry.id).unwrap();
    engine.push_pending_entries(&profile).unwrap();

    assert!(server.entry(&entry.id).unwrap().deleted);
    assert!(store.list_entries_for_user(&profile.id).unwrap().is_empty());
}

#[test]
fn dashboard_sees_mobile_delete() {
    let server = Arc::new(CentralServer::new());
    server.seed_entry("u1", remote_entry("e1", "2024-01-01T00:00:00Z"));
    let store = TestStore::new();
    let engine = dashboard(&server, &store);

    engine.pull_entries("u1").unwrap();
    assert_eq!(store.list_entries_for_user("u1").unwrap().len(), 1);

    let mut deleted = remote_entry("e1", "2024-02-01T00:00:00Z");
    deleted.ts = "2024-01-01T00:00:00Z".into();
    deleted.deleted = true;
    server.seed_entry("u1", deleted);

    let report = engine.pull_entries("u1").unwrap();
    assert_eq!(report.received, 1);
    assert_eq!(report.cursor, Timestamp::new("2024-02-01T00:00:00Z"));
    assert!(store.list_entries_for_user("u1").unwrap().is_empty());
    assert!(store.get::<Entry>("e1").unwrap().unwrap().deleted);
    assert_eq!(server.requests()[1].query["include_deleted"], "1");
}

#[test]
fn resend_of_stored_version_stays_pending_until_pulled_back() {
    let server = Arc::new(CentralServer::new());
    let store = TestStore::new();
    let engine = engine_for(&server, &store, SyncConfig::new("http://central.test"));
    let profile = store.get_or_create_self_profile("Phone").unwrap();
    let entry = store
        .insert_entry(NewEntry {
            user_id: profile.id.clone(),
            mood: Some(3),
            ..NewEntry::default()
        })
        .unwrap();

    // The backend stored this version but the acknowledgement never arrived.
    server.seed_entry(&profile.id, remote_entry(&entry.id, entry.last_modified.as_str()));

    let push = engine.push_pending_entries(&profile).unwrap();
    assert_eq!((push.sent, push.acknowledged, push.remaining), (1, 0, 1));
    let after_push = store.get::<Entry>(&entry.id).unwrap().unwrap();
    assert_eq!(after_push.sync_status, SyncStatus::Pending);

    let round = engine.sync_mobile().unwrap();
    assert_eq!(round.push.unwrap().acknowledged, 0);
    assert_eq!(round.pull.unwrap().applied, 1);
    let healed = store.get::<Entry>(&entry.id).unwrap().unwrap();
    assert_eq!(healed.sync_status, SyncStatus::Synced);
    assert!(store.pending_entries(10).unwrap().is_empty());
}

#[test]
fn note_already_on_backend_is_cleared_by_pull() {
    let server = Arc::new(CentralServer::new());
    let store = TestStore::new();
    let engine = dashboard(&server, &store);
    let queue = OutboundQueue::new(&store);
    queue
        .enqueue(&queued_note("n1", "u1", "follow up", "2024-01-01T00:00:00Z"))
        .unwrap();

    // Stored on the first upload, acknowledgement lost in transit.
    server.seed_entry("u1", remote_entry("n1", "2024-01-01T00:00:00Z"));
    let push = engine.push_queued().unwrap();
    assert_eq!(push.acknowledged, 0);
    assert_eq!(queue.len(), 1);

    let pull = engine.pull_entries("u1").unwrap();
    assert_eq!(pull.notes_confirmed, 1);
    assert!(queue.is_empty());
}

#[test]
fn full_page_is_flagged() {
    let server = Arc::new(CentralServer::new());
    for (id, at) in [
        ("a", "2024-01-01T00:00:00Z"),
        ("b", "2024-01-02T00:00:00Z"),
        ("c", "2024-01-03T00:00:00Z"),
    ] {
        server.seed_entry("u1", remote_entry(id, at));
    }
    let store = TestStore::new();
    let engine = engine_for(
        &server,
        &store,
        SyncConfig::new("http://central.test").with_pull_limit(2),
    );

    let report = engine.pull_entries("u1").unwrap();
    assert_eq!(report.received, 2);
    assert!(report.limit_reached);
    assert_eq!(server.requests()[0].query["limit"], "2");

    let other = TestStore::new();
    let roomy = engine_for(&server, &other, SyncConfig::new("http://central.test"));
    assert!(!roomy.pull_entries("u1").unwrap().limit_reached);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pulls_are_idempotent_and_cursor_is_running_max(
        batch in arb_entry_batch("u1", 12),
        prior in proptest::option::of(arb_timestamp()),
    ) {
        let server = Arc::new(CentralServer::new());
        for row in &batch {
            server.seed_entry("u1", row.clone());
        }
        let store = TestStore::new();
        if let Some(prior) = &prior {
            CursorRegistry::new(&store)
                .advance(&CursorScope::entries("u1"), &Timestamp::new(prior.as_str()))
                .unwrap();
        }
        let engine = dashboard(&server, &store);

        let first = engine.pull_entries("u1").unwrap();
        let snapshot: Vec<Entry> = store.all().unwrap();
        let on_server = server.entries_for("u1");
        let expected = on_server
            .iter()
            .map(|e| e.modified_at().to_string())
            .chain(prior.clone())
            .max()
            .unwrap_or_else(|| Timestamp::epoch().as_str().to_string());
        prop_assert_eq!(first.cursor.as_str(), expected.as_str());

        for row in on_server
            .iter()
            .filter(|e| prior.as_deref().map_or(true, |p| e.modified_at() > p))
        {
            let cached = store.get::<Entry>(&row.id).unwrap();
            prop_assert_eq!(cached.map(|e| e.deleted), Some(row.deleted));
        }

        let second = engine.pull_entries("u1").unwrap();
        prop_assert!(!second.cursor_advanced);
        prop_assert_eq!(second.cursor, first.cursor);
        prop_assert_eq!(store.all::<Entry>().unwrap(), snapshot);
    }
}
