//! Natural language date input.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// A parsed date/time input: a whole day or an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    Day(NaiveDate),
    At(DateTime<Utc>),
}

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// The full day or month name `word` abbreviates ("thurs", "sept"), if
/// exactly one starts with it. Shorter than three letters never matches.
fn full_name(word: &str) -> Option<&'static str> {
    if word.len() < 3 {
        return None;
    }
    let mut names = WEEKDAYS
        .iter()
        .chain(MONTHS.iter())
        .copied()
        .filter(|name| name.starts_with(word));
    match (names.next(), names.next()) {
        (Some(name), None) => Some(name),
        _ => None,
    }
}

/// Lowercase `input` and spell out abbreviations fuzzydate doesn't know.
fn expand_abbreviations(input: &str) -> String {
    let lower = input.to_lowercase();
    lower
        .split_whitespace()
        .map(|word| full_name(word).unwrap_or(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A word that reads as a clock time on its own: "noon", "6pm", "9:30",
/// "2025-03-20t15:00".
fn is_clock_word(word: &str) -> bool {
    if word == "noon" || word == "midnight" {
        return true;
    }
    let meridiem = word
        .strip_suffix("am")
        .or_else(|| word.strip_suffix("pm"))
        .is_some_and(|hour| hour.ends_with(|c: char| c.is_ascii_digit()));
    let colon = word
        .as_bytes()
        .windows(3)
        .any(|w| w[0].is_ascii_digit() && w[1] == b':' && w[2].is_ascii_digit());
    meridiem || colon
}

/// Whether the input names a time of day. Also catches times split over two
/// words: "3 pm" and "at 9".
fn has_time_component(input: &str) -> bool {
    let lower = input.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    words.iter().enumerate().any(|(i, word)| {
        let previous = i.checked_sub(1).map(|p| words[p]);
        let after_number = previous.is_some_and(|p| p.chars().all(|c| c.is_ascii_digit()));
        let starts_with_digit = word.starts_with(|c: char| c.is_ascii_digit());

        is_clock_word(word)
            || (matches!(*word, "am" | "pm") && after_number)
            || (previous == Some("at") && starts_with_digit)
    })
}

fn parse_naive(input: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }

    let expanded = expand_abbreviations(input);
    fuzzydate::parse(&expanded).map_err(|_| anyhow::anyhow!("Could not parse date/time: \"{}\"", input))
}

/// Wall-clock time in `tz` as an instant; the earlier reading wins when
/// clocks are set back.
fn to_utc(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("{naive} does not exist in {}", tz.name()))
}

/// Parse a natural language date/time. Inputs without a time of day are whole days.
pub fn parse_when(input: &str, tz: Tz) -> Result<When> {
    let naive = parse_naive(input.trim())?;
    if has_time_component(input) {
        Ok(When::At(to_utc(naive, tz)?))
    } else {
        Ok(When::Day(naive.date()))
    }
}

/// Parse a natural language date, ignoring any time of day.
pub fn parse_day(input: &str) -> Result<NaiveDate> {
    Ok(parse_naive(input.trim())?.date())
}

pub fn parse_duration(input: &str) -> Result<Duration> {
    let std_dur = humantime::parse_duration(input)
        .with_context(|| format!("Could not parse duration: \"{}\"", input))?;
    Duration::from_std(std_dur).context("Duration too large")
}
