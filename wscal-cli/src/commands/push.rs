use anyhow::Result;
use owo_colors::OwoColorize;

use crate::context;
use crate::utils::tui;

pub async fn run(id: &str) -> Result<()> {
    let (_, ctx) = context::open().await?;

    let spinner = tui::create_spinner("Pushing...".to_string());
    let result = ctx.push_event(id).await;
    spinner.finish_and_clear();

    let pushed = result?;
    println!("{}", format!("  Pushed: {}", pushed.title()).green());
    println!("  {} {}", "Provider id:".dimmed(), pushed.id);

    Ok(())
}
