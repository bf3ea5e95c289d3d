use anyhow::Result;
use owo_colors::OwoColorize;
use wscal_core::sync::SyncProgress;

use crate::context;
use crate::render::{Render, render_plan};
use crate::utils::tui;

/// Reconcile provider events into the workspace calendar.
pub async fn run() -> Result<()> {
    let (_, ctx) = context::open().await?;
    let before = ctx.get_events().len();

    let bar = tui::create_sync_bar();
    let last_message = std::sync::Mutex::new(None::<String>);
    let report = |progress: SyncProgress| {
        tui::show_sync_progress(&bar, &progress);
        if let Some(message) = progress.status_message {
            *last_message.lock().unwrap_or_else(|e| e.into_inner()) = Some(message);
        }
    };

    let changed = ctx.sync_provider_now(&report).await;
    bar.finish_and_clear();

    if let Some(message) = last_message.into_inner().unwrap_or_else(|e| e.into_inner()) {
        println!("{}", message.red());
    } else if changed {
        println!("Synced: {} → {} events", before, ctx.get_events().len());
    } else {
        println!("{}", "Already up to date".dimmed());
    }

    Ok(())
}

/// Reconcile with a forced provider fetch and summarize the change.
pub async fn full() -> Result<()> {
    let (_, ctx) = context::open().await?;

    let bar = tui::create_sync_bar();
    let report = |progress: SyncProgress| tui::show_sync_progress(&bar, &progress);
    let summary = ctx.full_sync(&report).await;
    bar.finish_and_clear();

    println!("{}", summary.render());
    Ok(())
}

/// Upsert provider events without deleting or adopting local ones.
pub async fn quick() -> Result<()> {
    let (_, ctx) = context::open().await?;

    let spinner = tui::create_spinner("Syncing...".to_string());
    let last_message = std::sync::Mutex::new(None::<String>);
    let report = |progress: SyncProgress| {
        if let Some(message) = progress.status_message {
            *last_message.lock().unwrap_or_else(|e| e.into_inner()) = Some(message);
        }
    };
    let changed = ctx.quick_sync(&report).await;
    spinner.finish_and_clear();

    match last_message.into_inner().unwrap_or_else(|e| e.into_inner()) {
        Some(message) => println!("{}", message.red()),
        None if changed => println!("Synced {} events", ctx.get_events().len()),
        None => println!("{}", "Already up to date".dimmed()),
    }

    Ok(())
}

/// Show the writes a sync would make.
pub async fn plan() -> Result<()> {
    let (_, ctx) = context::open().await?;

    let spinner = tui::create_spinner("Fetching provider events...".to_string());
    let plan = ctx.plan_provider_sync().await;
    spinner.finish_and_clear();

    let plan = plan?;
    println!("{}", render_plan(&plan, true));

    let (created, updated, deleted) = plan.counts();
    if !plan.is_empty() {
        println!(
            "\nWould sync: {} created, {} updated, {} deleted",
            created, updated, deleted
        );
    }

    Ok(())
}
