//! Outbound note commands.

use crate::commands::emit;
use crate::{Context, Format};
use wellsync_core::OutboundQueue;

/// Queues a note about `user`.
pub fn note(ctx: &Context, user: &str, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let note = OutboundQueue::new(&ctx.store).queue_note(user, text)?;
    println!("queued {}", note.id);
    Ok(())
}

/// Shows queued notes.
pub fn queue(ctx: &Context, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let queued = OutboundQueue::new(&ctx.store).list_queued()?;
    emit(format, &queued, |queued| {
        if queued.is_empty() {
            println!("queue is empty");
        }
        for note in queued {
            println!("{}  {}  user={}  {}", note.ts, note.id, note.user_id, note.note);
        }
    })
}
