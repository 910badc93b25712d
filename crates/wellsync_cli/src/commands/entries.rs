//! Check-in commands.

use crate::commands::emit;
use crate::{Context, Format};
use serde::Serialize;
use wellsync_core::{Entry, NewEntry};

/// Creates (or shows) the device's profile.
pub fn init(ctx: &Context, label: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let label = label.unwrap_or(wellsync_sync_engine::DEFAULT_USER_LABEL);
    let profile = ctx.store.get_or_create_self_profile(label)?;
    println!(
        "profile {} ({})",
        profile.id,
        profile.label.as_deref().unwrap_or("-")
    );
    Ok(())
}

/// Records a check-in.
pub fn add(
    ctx: &Context,
    user: Option<String>,
    mood: Option<i64>,
    stress: Option<i64>,
    note: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let user_id = match user {
        Some(user) => user,
        None => {
            ctx.store
                .get_or_create_self_profile(wellsync_sync_engine::DEFAULT_USER_LABEL)?
                .id
        }
    };
    let entry = ctx.store.insert_entry(NewEntry {
        user_id,
        mood,
        stress,
        note,
    })?;
    println!("added {}", entry.id);
    Ok(())
}

/// Changes the given fields of a check-in.
pub fn edit(
    ctx: &Context,
    id: &str,
    mood: Option<i64>,
    stress: Option<i64>,
    note: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let updated = ctx.store.update_entry(id, |entry| {
        if mood.is_some() {
            entry.mood = mood;
        }
        if stress.is_some() {
            entry.stress = stress;
        }
        if note.is_some() {
            entry.note = note;
        }
    })?;
    match updated {
        Some(entry) => {
            println!("updated {} at {}", entry.id, entry.last_modified);
            Ok(())
        }
        None => Err(format!("no entry {id}").into()),
    }
}

/// Soft-deletes a check-in.
pub fn delete(ctx: &Context, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    match ctx.store.soft_delete_entry(id)? {
        Some(entry) => {
            println!("deleted {}", entry.id);
            Ok(())
        }
        None => Err(format!("no entry {id}").into()),
    }
}

#[derive(Serialize)]
struct EntryRow<'a> {
    id: &'a str,
    user_id: &'a str,
    ts: &'a str,
    mood: Option<i64>,
    stress: Option<i64>,
    note: Option<&'a str>,
    sync_status: &'static str,
}

impl<'a> From<&'a Entry> for EntryRow<'a> {
    fn from(entry: &'a Entry) -> Self {
        Self {
            id: &entry.id,
            user_id: &entry.user_id,
            ts: entry.ts.as_str(),
            mood: entry.mood,
            stress: entry.stress,
            note: entry.note.as_deref(),
            sync_status: entry.sync_status.as_str(),
        }
    }
}

/// Lists non-deleted check-ins, newest first.
pub fn list(
    ctx: &Context,
    user: Option<&str>,
    limit: usize,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut entries = match user {
        Some(user) => ctx.store.list_entries_for_user(user)?,
        None => ctx.store.list_entries(limit)?,
    };
    entries.truncate(limit);
    let rows: Vec<EntryRow<'_>> = entries.iter().map(EntryRow::from).collect();

    emit(format, &rows, |rows| {
        if rows.is_empty() {
            println!("no entries");
        }
        for row in rows {
            println!(
                "{}  {}  mood={} stress={} [{}] {}",
                row.ts,
                row.id,
                score(row.mood),
                score(row.stress),
                row.sync_status,
                row.note.unwrap_or("")
            );
        }
    })
}

fn score(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
