//! Status and maintenance commands.

use crate::commands::emit;
use crate::{Context, Format};
use serde::Serialize;
use wellsync_core::{CursorRegistry, MetaKey};

#[derive(Serialize)]
struct Status {
    store: String,
    profile: Option<String>,
    users: usize,
    entries: usize,
    pending_entries: usize,
    queued_notes: usize,
    journal_bytes: u64,
    cursors: Vec<CursorStatus>,
}

#[derive(Serialize)]
struct CursorStatus {
    key: String,
    since: String,
}

/// Shows what the store holds and how far each scope has been pulled.
pub fn run(ctx: &Context, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let summary = ctx.store.summary()?;
    let cursors = CursorRegistry::new(&ctx.store)
        .list()?
        .into_iter()
        .map(|(scope, since)| CursorStatus {
            key: MetaKey::Cursor(scope).as_key(),
            since: since.to_string(),
        })
        .collect();

    let status = Status {
        store: ctx.store_path.display().to_string(),
        profile: ctx.store.self_profile()?.map(|p| p.id),
        users: summary.users,
        entries: summary.entries,
        pending_entries: summary.pending_entries,
        queued_notes: summary.queued_notes,
        journal_bytes: summary.journal_bytes,
        cursors,
    };

    emit(format, &status, |status| {
        println!("store:           {}", status.store);
        println!("profile:         {}", status.profile.as_deref().unwrap_or("(none)"));
        println!("users:           {}", status.users);
        println!("entries:         {}", status.entries);
        println!("pending entries: {}", status.pending_entries);
        println!("queued notes:    {}", status.queued_notes);
        println!("journal bytes:   {}", status.journal_bytes);
        for cursor in &status.cursors {
            println!("{:<40} {}", cursor.key, cursor.since);
        }
    })
}

/// Compacts the journal.
pub fn compact(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let before = ctx.store.journal_size()?;
    ctx.store.compact()?;
    println!("journal {} -> {} bytes", before, ctx.store.journal_size()?);
    Ok(())
}
