//! Sync commands.

use crate::{Context, Role};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use wellsync_sync_engine::{PullReport, PushReport, SyncError};

/// Refreshes cached user profiles.
pub fn pull_users(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let count = ctx.engine()?.pull_users()?;
    println!("cached {count} users");
    Ok(())
}

/// Pulls `user`'s changed entries.
pub fn pull_entries(ctx: &Context, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = ctx.engine()?.pull_entries(user)?;
    print_pull(&report);
    Ok(())
}

/// Uploads queued notes.
pub fn push_notes(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let report = ctx.engine()?.push_queued()?;
    print_push("notes", &report);
    Ok(())
}

/// Uploads pending check-ins, then pulls the device's own rows.
///
/// Both halves run; the first failure is returned.
pub fn sync_mobile(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let round = ctx.engine()?.sync_mobile()?;
    if let Ok(report) = &round.push {
        print_push("entries", report);
    }
    if let Ok(report) = &round.pull {
        print_pull(report);
    }
    round.push?;
    round.pull?;
    Ok(())
}

/// Pulls the device's own rows.
pub fn pull_own(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let engine = ctx.engine()?;
    let profile = ctx
        .store
        .get_or_create_self_profile(&engine.config().user_label)?;
    let report = engine.pull_own_entries(&profile.id)?;
    print_pull(&report);
    Ok(())
}

/// Runs rounds on the configured interval until `rounds` are done, or
/// forever. `interval` seconds, when given, override the configuration.
///
/// A failed round is reported and the next one runs on schedule.
pub fn watch(
    ctx: &Context,
    role: Role,
    user: Option<&str>,
    interval: Option<u64>,
    rounds: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ctx.sync_config()?;
    if let Some(secs) = interval {
        config = config.with_sync_interval(Duration::from_secs(secs));
    }
    let engine = ctx.engine_with(config)?;
    let interval = engine.config().sync_interval;
    info!(interval_secs = interval.as_secs(), "watching");
    let mut round = 0u64;

    loop {
        round += 1;
        let mut errors: Vec<SyncError> = match role {
            Role::Mobile => match engine.sync_mobile() {
                Ok(outcome) => [outcome.push.err(), outcome.pull.err()]
                    .into_iter()
                    .flatten()
                    .collect(),
                Err(err) => vec![err],
            },
            Role::Dashboard => {
                let outcome = engine.sync_dashboard(user);
                [
                    outcome.push.err(),
                    outcome.users.err(),
                    outcome.entries.and_then(Result::err),
                ]
                .into_iter()
                .flatten()
                .collect()
            }
        };

        if errors.is_empty() {
            info!(round, "sync round complete");
        }
        for err in &errors {
            warn!(round, error = %err, "offline or sync failed");
        }
        if let Some(fatal) = errors.iter().position(|err| !err.is_offline()) {
            return Err(Box::new(errors.swap_remove(fatal)));
        }

        if rounds.is_some_and(|limit| round >= limit) {
            return Ok(());
        }
        thread::sleep(interval);
    }
}

fn print_pull(report: &PullReport) {
    println!(
        "received {} rows, applied {}, kept {} newer local; cursor {}{}",
        report.received,
        report.applied,
        report.kept_local,
        report.cursor,
        if report.cursor_advanced { " (advanced)" } else { "" }
    );
    if report.notes_confirmed > 0 {
        println!("{} queued notes were already on the backend", report.notes_confirmed);
    }
    if report.limit_reached {
        println!("row limit reached; older changes may be missing");
    }
}

fn print_push(what: &str, report: &PushReport) {
    println!(
        "sent {} {what}, {} acknowledged, {} still pending",
        report.sent, report.acknowledged, report.remaining
    );
    if report.skipped > 0 {
        println!("{} queued notes name no user and were not sent", report.skipped);
    }
}
