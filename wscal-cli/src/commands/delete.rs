use anyhow::Result;
use owo_colors::OwoColorize;

use crate::context;

pub async fn run(id: &str) -> Result<()> {
    let (_, ctx) = context::open().await?;
    let title = ctx.get_event(id).map(|e| e.title).unwrap_or_else(|| id.to_string());

    let report = ctx.delete_event(id).await?;
    println!("{}", format!("  Deleted: {title}").red());

    if report.needs_reauth() {
        println!(
            "{}",
            "  The provider connection has expired; the provider copy was kept. Run `wscal auth` to reconnect."
                .yellow()
        );
    }
    if let Some(error) = &report.provider_error {
        println!("{}", format!("  Provider copy not deleted: {error}").yellow());
    }

    Ok(())
}
