//! Durability tests for the local store.

use std::fs::OpenOptions;
use std::io::Write;
use tempfile::TempDir;
use wellsync_core::{
    CursorRegistry, CursorScope, Entry, LocalStore, NewEntry, OutboundQueue, StoreConfig,
    StoreError, SyncStatus, Timestamp,
};

fn new_entry(user: &str, mood: i64) -> NewEntry {
    NewEntry {
        user_id: user.into(),
        mood: Some(mood),
        stress: None,
        note: Some(format!("mood {mood}")),
    }
}

#[test]
fn everything_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let scope = CursorScope::entries("u-1");

    let (entry, note, profile) = {
        let store = LocalStore::open(dir.path()).unwrap();
        let profile = store.get_or_create_self_profile("Phone").unwrap();
        let entry = store.insert_entry(new_entry(&profile.id, 4)).unwrap();
        store.soft_delete_entry(&entry.id).unwrap();
        let note = OutboundQueue::new(&store).queue_note("u-1", "hello").unwrap();
        CursorRegistry::new(&store)
            .advance(&scope, &Timestamp::new("2024-02-01T00:00:00Z"))
            .unwrap();
        (entry, note, profile)
    };

    let store = LocalStore::open(dir.path()).unwrap();
    let reloaded = store.get::<Entry>(&entry.id).unwrap().unwrap();
    assert!(reloaded.deleted);
    assert_eq!(reloaded.sync_status, SyncStatus::Pending);
    assert_eq!(OutboundQueue::new(&store).list_queued().unwrap(), vec![note]);
    assert_eq!(
        CursorRegistry::new(&store).read(&scope).unwrap(),
        Timestamp::new("2024-02-01T00:00:00Z")
    );
    assert_eq!(store.self_profile().unwrap(), Some(profile));
}

#[test]
fn second_handle_on_same_directory_is_refused() {
    let dir = TempDir::new().unwrap();
    let _first = LocalStore::open(dir.path()).unwrap();

    match LocalStore::open(dir.path()) {
        Err(StoreError::Locked(_)) => {}
        other => panic!("expected lock error, got {other:?}"),
    }
}

#[test]
fn torn_tail_is_discarded_on_open() {
    let dir = TempDir::new().unwrap();
    let kept = {
        let store = LocalStore::open(dir.path()).unwrap();
        store.insert_entry(new_entry("u", 1)).unwrap()
    };

    let journal = dir.path().join("journal.wsj");
    let clean_len = std::fs::metadata(&journal).unwrap().len();
    let mut file = OpenOptions::new().append(true).open(&journal).unwrap();
    file.write_all(b"WSJ1\x01\x00\x01\xff\xff").unwrap();
    drop(file);

    let store = LocalStore::open(dir.path()).unwrap();
    assert_eq!(store.get::<Entry>(&kept.id).unwrap(), Some(kept));
    assert_eq!(store.journal_size().unwrap(), clean_len);

    store.insert_entry(new_entry("u", 2)).unwrap();
    drop(store);
    let store = LocalStore::open(dir.path()).unwrap();
    assert_eq!(store.list_entries_for_user("u").unwrap().len(), 2);
}

#[test]
fn compaction_preserves_state_across_reopen() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default().with_compact_threshold(None);
    {
        let store = LocalStore::open_with_config(dir.path(), config.clone()).unwrap();
        let entry = store.insert_entry(new_entry("u", 1)).unwrap();
        for mood in 2..20 {
            store.update_entry(&entry.id, |e| e.mood = Some(mood)).unwrap();
        }
        let before = store.journal_size().unwrap();
        store.compact().unwrap();
        assert!(store.journal_size().unwrap() < before);
    }

    let store = LocalStore::open_with_config(dir.path(), config).unwrap();
    let entries = store.list_entries_for_user("u").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].mood, Some(19));
}
