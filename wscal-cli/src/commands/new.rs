use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use owo_colors::OwoColorize;
use wscal_core::time::create_all_day_range;
use wscal_core::{NewEvent, SupportedColor};

use crate::context;
use crate::render::render_event;
use crate::utils::dates::{self, When};

pub struct NewArgs {
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub locked: bool,
}

pub async fn run(args: NewArgs) -> Result<()> {
    let (_, ctx) = context::open().await?;
    let settings = ctx.settings();
    let tz = settings.timezone;

    let start = dates::parse_when(&args.start, tz)?;
    let (start_at, end_at) = resolve_range(
        start,
        args.end.as_deref(),
        args.duration.as_deref(),
        tz,
        Duration::minutes(settings.default_event_minutes),
    )?;

    let color = match args.color {
        Some(name) => name.parse::<SupportedColor>()?,
        None => settings.default_color,
    };

    let event = NewEvent {
        ws_id: ctx.ws_id().to_string(),
        title: args.title,
        description: args.description.unwrap_or_default(),
        location: args.location.unwrap_or_default(),
        start_at,
        end_at,
        color,
        locked: args.locked,
        google_event_id: None,
    };

    let created = ctx.add_event(event).await?;
    println!("{}", format!("  Created: {}", created.title).green());
    println!("{}", render_event(&created, tz, ctx.get_event_level(&created.id), false));

    let overlaps = ctx.find_overlaps(&created);
    if !overlaps.is_empty() {
        let titles: Vec<_> = overlaps.iter().map(|e| e.title.as_str()).collect();
        println!("{}", format!("  Overlaps with: {}", titles.join(", ")).yellow());
    }

    Ok(())
}

/// Start and end instants for the given inputs.
///
/// Whole-day starts become all-day ranges from local midnight; an end day is
/// inclusive. Timed starts default to `default_length`.
fn resolve_range(
    start: When,
    end: Option<&str>,
    duration: Option<&str>,
    tz: Tz,
    default_length: Duration,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    match start {
        When::Day(day) => {
            let days = match (end, duration) {
                (Some(end), _) => (dates::parse_day(end)? - day).num_days() + 1,
                (None, Some(duration)) => dates::parse_duration(duration)?.num_days(),
                (None, None) => 1,
            };
            let days = u32::try_from(days).unwrap_or(0);
            let range = create_all_day_range(day, Some(tz.name()), days)?;
            Ok((range.start_at, range.end_at))
        }
        When::At(start_at) => {
            let end_at = match (end, duration) {
                (Some(end), _) => match dates::parse_when(end, tz)? {
                    When::At(end_at) => end_at,
                    When::Day(_) => bail!("End of a timed event needs a time: \"{}\"", end),
                },
                (None, Some(duration)) => start_at + dates::parse_duration(duration)?,
                (None, None) => start_at + default_length,
            };
            Ok((start_at, end_at))
        }
    }
}
