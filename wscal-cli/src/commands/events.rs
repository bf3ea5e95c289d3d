use anyhow::Result;
use chrono::{NaiveDate, Utc};
use owo_colors::OwoColorize;
use wscal_core::{CalendarEvent, DateRange};
use wscal_core::time::local_day;

use crate::context;
use crate::render::{format_date_label, render_event};
use crate::utils::dates;

pub async fn run(
    date: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    json: bool,
) -> Result<()> {
    let range = DateRange::from_args(from, to)?;
    let (_, ctx) = context::open().await?;
    let tz = ctx.settings().timezone;
    let today = local_day(Utc::now(), tz);

    let days: Vec<(NaiveDate, Vec<CalendarEvent>)> = match date {
        Some(input) => {
            let day = dates::parse_day(input)?;
            vec![(day, ctx.get_current_events(Some(day)))]
        }
        None => group_by_start_day(starting_within(ctx.get_events(), &range), tz),
    };

    if json {
        let events: Vec<&CalendarEvent> = days.iter().flat_map(|(_, events)| events).collect();
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if days.iter().all(|(_, events)| events.is_empty()) {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    for (i, (day, events)) in days.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", format_date_label(*day, today).bold());

        for event in events {
            let overlaps = !ctx.find_overlaps(event).is_empty();
            let level = ctx.get_event_level(&event.id);
            println!("{}", render_event(event, tz, level, overlaps));
        }
    }

    Ok(())
}

/// Events whose start falls inside `range`.
fn starting_within(events: Vec<CalendarEvent>, range: &DateRange) -> Vec<CalendarEvent> {
    events
        .into_iter()
        .filter(|event| range.contains(event.start_at))
        .collect()
}

fn group_by_start_day(
    events: Vec<CalendarEvent>,
    tz: chrono_tz::Tz,
) -> Vec<(NaiveDate, Vec<CalendarEvent>)> {
    let mut days: Vec<(NaiveDate, Vec<CalendarEvent>)> = Vec::new();

    for event in events {
        let day = local_day(event.start_at, tz);
        match days.last_mut() {
            Some((current, bucket)) if *current == day => bucket.push(event),
            _ => days.push((day, vec![event])),
        }
    }

    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wscal_core::SupportedColor;

    fn event_at(day: u32) -> CalendarEvent {
        let start = Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap();
        CalendarEvent::draft("ws-1", start, 60, SupportedColor::Blue)
    }

    #[test]
    fn range_flags_filter_by_start_day() {
        let range = DateRange::from_args(Some("2024-03-10"), Some("2024-03-12")).unwrap();
        let events = vec![event_at(9), event_at(10), event_at(12), event_at(13)];

        let days: Vec<u32> = starting_within(events, &range)
            .iter()
            .map(|e| chrono::Datelike::day(&e.start_at))
            .collect();
        assert_eq!(days, vec![10, 12]);
    }

    #[test]
    fn open_range_keeps_everything() {
        let range = DateRange::from_args(None, None).unwrap();
        assert_eq!(starting_within(vec![event_at(1), event_at(30)], &range).len(), 2);
    }
}
