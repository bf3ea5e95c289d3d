use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use owo_colors::OwoColorize;
use wscal_core::{EventPatch, SupportedColor};

use crate::context;
use crate::render::render_event;
use crate::utils::dates::{self, When};

pub struct UpdateArgs {
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub locked: Option<bool>,
}

pub async fn run(id: &str, args: UpdateArgs) -> Result<()> {
    let (_, ctx) = context::open().await?;
    let tz = ctx.settings().timezone;

    let patch = EventPatch {
        title: args.title,
        description: args.description,
        location: args.location,
        start_at: args.start.as_deref().map(|s| parse_instant(s, tz)).transpose()?,
        end_at: args.end.as_deref().map(|s| parse_instant(s, tz)).transpose()?,
        color: args.color.map(|c| c.parse::<SupportedColor>()).transpose()?,
        locked: args.locked,
    };

    if patch.is_empty() {
        println!("{}", "Nothing to update".dimmed());
        return Ok(());
    }

    let updated = ctx.update_event(id, patch).await?;

    println!("{}", format!("  Updated: {}", updated.title).yellow());
    println!("{}", render_event(&updated, tz, ctx.get_event_level(&updated.id), false));

    Ok(())
}

fn parse_instant(input: &str, tz: Tz) -> Result<DateTime<Utc>> {
    match dates::parse_when(input, tz)? {
        When::At(instant) => Ok(instant),
        When::Day(_) => bail!("Include a time of day: \"{}\"", input),
    }
}
