use anyhow::Result;
use owo_colors::OwoColorize;

use crate::context;
use crate::render::render_event;

pub async fn run() -> Result<()> {
    let (_, ctx) = context::open().await?;

    match ctx.get_upcoming_event() {
        Some(event) => {
            let level = ctx.get_event_level(&event.id);
            let overlaps = !ctx.find_overlaps(&event).is_empty();
            println!("{}", render_event(&event, ctx.settings().timezone, level, overlaps));
        }
        None => println!("{}", "Nothing else today".dimmed()),
    }

    Ok(())
}
