//! Day bucketing and lane assignment over a list of events.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::event::CalendarEvent;
use crate::time::local_day;

/// Whether `event` shows up on `day`.
///
/// All-day events end at the midnight after their last day, so their end
/// day is exclusive. Timed events include the day they end on.
pub fn occurs_on(event: &CalendarEvent, day: NaiveDate, tz: Tz) -> bool {
    let start_day = local_day(event.start_at, tz);
    let end_day = local_day(event.end_at, tz);

    if event.is_all_day() {
        start_day <= day && day < end_day
    } else {
        start_day <= day && day <= end_day
    }
}

pub fn events_on<'a>(events: &'a [CalendarEvent], day: NaiveDate, tz: Tz) -> Vec<&'a CalendarEvent> {
    events.iter().filter(|e| occurs_on(e, day, tz)).collect()
}

/// Next event starting later today that has not ended.
pub fn upcoming(events: &[CalendarEvent], now: DateTime<Utc>, tz: Tz) -> Option<&CalendarEvent> {
    let today = local_day(now, tz);
    events
        .iter()
        .filter(|e| local_day(e.start_at, tz) == today && e.start_at > now && e.end_at > now)
        .min_by_key(|e| e.start_at)
}

fn same_start_day_overlap(a: &CalendarEvent, b: &CalendarEvent, tz: Tz) -> bool {
    local_day(a.start_at, tz) == local_day(b.start_at, tz) && a.range().overlaps(&b.range())
}

/// Events starting on the same day as `event` whose intervals overlap it.
pub fn overlapping<'a>(
    events: &'a [CalendarEvent],
    event: &CalendarEvent,
    tz: Tz,
) -> Vec<&'a CalendarEvent> {
    events
        .iter()
        .filter(|e| e.id != event.id && same_start_day_overlap(e, event, tz))
        .collect()
}

/// Lane per event id.
///
/// An event sits one lane above the highest lane among the earlier events in
/// `events` that start the same day and overlap it, or in lane 0.
pub fn levels(events: &[CalendarEvent], tz: Tz) -> HashMap<String, usize> {
    let mut lanes: Vec<usize> = Vec::with_capacity(events.len());

    for (index, event) in events.iter().enumerate() {
        let lane = events[..index]
            .iter()
            .zip(&lanes)
            .filter(|(earlier, _)| earlier.id != event.id && same_start_day_overlap(earlier, event, tz))
            .map(|(_, lane)| lane + 1)
            .max()
            .unwrap_or(0);
        lanes.push(lane);
    }

    events
        .iter()
        .zip(lanes)
        .map(|(event, lane)| (event.id.clone(), lane))
        .collect()
}
