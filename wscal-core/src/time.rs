//! Time arithmetic and all-day classification.
//!
//! All-day events arrive from the provider as bare `YYYY-MM-DD` dates with no
//! zone attached. Read as UTC they land a day early for anyone west of
//! Greenwich, so every conversion of provider dates goes through this module.

use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

use crate::constants::ROUNDING_MINUTES;
use crate::error::{CalendarError, CalendarResult};

/// Timezone name that resolves to the zone detected on this machine.
pub const AUTO_TIMEZONE: &str = "auto";

const SECONDS_PER_DAY: i64 = 86_400;

/// A span between two absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Self {
        TimeRange { start_at, end_at }
    }

    pub fn duration(&self) -> Duration {
        self.end_at - self.start_at
    }

    pub fn is_all_day(&self) -> bool {
        is_all_day_event(self.start_at, self.end_at)
    }

    /// Interval overlap. Ranges that only touch at a boundary do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !(other.end_at <= self.start_at || other.start_at >= self.end_at)
    }
}

/// An event is all-day iff its duration is a non-zero whole multiple of 24 hours.
pub fn is_all_day_event(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> bool {
    let duration = end_at - start_at;
    let seconds = duration.num_seconds();
    seconds > 0 && duration.subsec_nanos() == 0 && seconds % SECONDS_PER_DAY == 0
}

/// Start/end exactly as they should be persisted, in ISO-8601 form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRange {
    pub start_at: String,
    pub end_at: String,
}

impl ProviderRange {
    pub fn parse(&self) -> CalendarResult<TimeRange> {
        Ok(TimeRange::new(
            parse_instant(&self.start_at)?,
            parse_instant(&self.end_at)?,
        ))
    }
}

/// Convert a provider start/end pair into persisted instants.
///
/// - a missing bound yields `now .. now + 1h`
/// - two bare dates become local midnights in `tz` (`None` and `"auto"` use the
///   detected zone)
/// - anything else passes through untouched, including mixed date/datetime pairs
pub fn convert_provider_all_day_range(
    start_date: Option<&str>,
    end_date: Option<&str>,
    tz: Option<&str>,
) -> CalendarResult<ProviderRange> {
    convert_provider_all_day_range_at(start_date, end_date, tz, Utc::now())
}

pub fn convert_provider_all_day_range_at(
    start_date: Option<&str>,
    end_date: Option<&str>,
    tz: Option<&str>,
    now: DateTime<Utc>,
) -> CalendarResult<ProviderRange> {
    let start = start_date.map(str::trim).filter(|s| !s.is_empty());
    let end = end_date.map(str::trim).filter(|s| !s.is_empty());

    let (Some(start), Some(end)) = (start, end) else {
        return Ok(ProviderRange {
            start_at: iso_string(now),
            end_at: iso_string(now + Duration::hours(1)),
        });
    };

    match (parse_date_only(start), parse_date_only(end)) {
        (Some(start_day), Some(end_day)) => {
            let zone = resolve_timezone(tz.unwrap_or(AUTO_TIMEZONE))?;
            Ok(ProviderRange {
                start_at: iso_string(local_midnight(start_day, zone)),
                end_at: iso_string(local_midnight(end_day, zone)),
            })
        }
        _ => Ok(ProviderRange {
            start_at: start.to_string(),
            end_at: end.to_string(),
        }),
    }
}

/// All-day range starting at local midnight of `date` in `tz` (UTC midnight when
/// `tz` is `None`) and ending `duration_days` midnights later.
pub fn create_all_day_range(
    date: NaiveDate,
    tz: Option<&str>,
    duration_days: u32,
) -> CalendarResult<TimeRange> {
    if duration_days == 0 {
        return Err(CalendarError::Validation(
            "All-day range must span at least one day".into(),
        ));
    }

    let end_date = date + Duration::days(i64::from(duration_days));

    match tz {
        None => Ok(TimeRange::new(
            date.and_time(NaiveTime::MIN).and_utc(),
            end_date.and_time(NaiveTime::MIN).and_utc(),
        )),
        Some(name) => {
            let zone = resolve_timezone(name)?;
            Ok(TimeRange::new(
                local_midnight(date, zone),
                local_midnight(end_date, zone),
            ))
        }
    }
}

/// Resolve an IANA zone name, with `"auto"` meaning the zone of this machine.
pub fn resolve_timezone(name: &str) -> CalendarResult<Tz> {
    if name.eq_ignore_ascii_case(AUTO_TIMEZONE) {
        return match iana_time_zone::get_timezone() {
            Ok(detected) => detected.parse::<Tz>().map_err(|_| {
                CalendarError::Config(format!("Detected timezone '{detected}' is unknown"))
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Could not detect local timezone, using UTC");
                Ok(Tz::UTC)
            }
        };
    }

    name.parse::<Tz>()
        .map_err(|_| CalendarError::Validation(format!("Unknown timezone '{name}'")))
}

/// The instant at which `date` begins in `tz`.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // Midnight skipped by a DST jump; the day starts an hour later.
        LocalResult::None => tz
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc()),
    }
}

/// Calendar day of an instant as seen in `tz`.
pub fn local_day(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Snap to the nearest quarter hour: remainders under 8 minutes round down,
/// the rest round up. Seconds are dropped before rounding.
pub fn round_to_nearest_15_minutes(instant: DateTime<Utc>) -> DateTime<Utc> {
    let minute_floor = instant.timestamp().div_euclid(60);
    let remainder = minute_floor.rem_euclid(ROUNDING_MINUTES);
    let rounded = if remainder < 8 {
        minute_floor - remainder
    } else {
        minute_floor + (ROUNDING_MINUTES - remainder)
    };

    DateTime::from_timestamp(rounded * 60, 0).unwrap_or(instant)
}

/// Persisted representation of an instant (`2024-01-01T05:00:00.000Z`).
pub fn iso_string(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 instant, or a bare date as UTC midnight.
pub fn parse_instant(value: &str) -> CalendarResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_date_only(value)
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .ok_or_else(|| CalendarError::Validation(format!("Invalid date/time '{value}'")))
}

fn parse_date_only(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn all_day_requires_exact_multiples_of_a_day() {
        let midnight = utc("2024-03-10T00:00:00Z");
        assert!(is_all_day_event(midnight, utc("2024-03-11T00:00:00Z")));
        assert!(is_all_day_event(midnight, utc("2024-03-12T00:00:00Z")));
        assert!(!is_all_day_event(
            utc("2024-03-10T10:00:00Z"),
            utc("2024-03-10T11:00:00Z")
        ));
        assert!(!is_all_day_event(midnight, midnight));
        assert!(!is_all_day_event(
            utc("2024-03-10T00:01:00Z"),
            utc("2024-03-11T00:00:00Z")
        ));
    }

    #[test]
    fn all_day_rejects_negative_and_sub_second_durations() {
        let midnight = utc("2024-03-10T00:00:00Z");
        assert!(!is_all_day_event(utc("2024-03-11T00:00:00Z"), midnight));
        assert!(!is_all_day_event(
            midnight,
            utc("2024-03-11T00:00:00.500Z")
        ));
    }

    #[test]
    fn date_only_range_uses_local_midnight() {
        let range = convert_provider_all_day_range(
            Some("2024-01-01"),
            Some("2024-01-02"),
            Some("America/New_York"),
        )
        .unwrap();

        assert_eq!(range.start_at, "2024-01-01T05:00:00.000Z");
        assert_eq!(range.end_at, "2024-01-02T05:00:00.000Z");
    }

    #[test]
    fn mixed_formats_pass_through_unchanged() {
        let range = convert_provider_all_day_range(
            Some("2024-01-01"),
            Some("2024-01-01T10:00:00-05:00"),
            Some("America/New_York"),
        )
        .unwrap();

        assert_eq!(range.start_at, "2024-01-01");
        assert_eq!(range.end_at, "2024-01-01T10:00:00-05:00");
    }

    #[test]
    fn missing_bound_falls_back_to_an_hour_from_now() {
        let now = utc("2024-06-01T12:34:56Z");
        let range = convert_provider_all_day_range_at(Some("2024-06-01"), None, None, now).unwrap();

        assert_eq!(range.start_at, "2024-06-01T12:34:56.000Z");
        assert_eq!(range.end_at, "2024-06-01T13:34:56.000Z");
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let result =
            convert_provider_all_day_range(Some("2024-01-01"), Some("2024-01-02"), Some("Mars/Base"));
        assert!(matches!(result, Err(CalendarError::Validation(_))));
    }

    #[test]
    fn create_all_day_range_in_utc_and_zone() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();

        let utc_range = create_all_day_range(date, None, 1).unwrap();
        assert_eq!(utc_range.start_at, utc("2024-07-04T00:00:00Z"));
        assert_eq!(utc_range.end_at, utc("2024-07-05T00:00:00Z"));
        assert!(utc_range.is_all_day());

        let tokyo = create_all_day_range(date, Some("Asia/Tokyo"), 3).unwrap();
        assert_eq!(tokyo.start_at, utc("2024-07-03T15:00:00Z"));
        assert_eq!(tokyo.end_at, utc("2024-07-06T15:00:00Z"));

        assert!(create_all_day_range(date, None, 0).is_err());
    }

    #[test]
    fn rounds_to_the_nearest_quarter_hour() {
        assert_eq!(
            round_to_nearest_15_minutes(utc("2024-01-01T10:07:59Z")),
            utc("2024-01-01T10:00:00Z")
        );
        assert_eq!(
            round_to_nearest_15_minutes(utc("2024-01-01T10:08:00Z")),
            utc("2024-01-01T10:15:00Z")
        );
        assert_eq!(
            round_to_nearest_15_minutes(utc("2024-01-01T23:53:00Z")),
            utc("2024-01-02T00:00:00Z")
        );
        assert_eq!(
            round_to_nearest_15_minutes(utc("2024-01-01T10:30:00Z")),
            utc("2024-01-01T10:30:00Z")
        );
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        let a = TimeRange::new(utc("2024-01-01T10:00:00Z"), utc("2024-01-01T11:00:00Z"));
        let b = TimeRange::new(utc("2024-01-01T10:30:00Z"), utc("2024-01-01T11:30:00Z"));
        let c = TimeRange::new(utc("2024-01-01T11:00:00Z"), utc("2024-01-01T12:00:00Z"));

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn parse_instant_accepts_offsets_and_bare_dates() {
        assert_eq!(
            parse_instant("2024-01-01T05:00:00+00:00").unwrap(),
            utc("2024-01-01T05:00:00Z")
        );
        assert_eq!(parse_instant("2024-01-01").unwrap(), utc("2024-01-01T00:00:00Z"));
        assert!(parse_instant("yesterday").is_err());
    }
}
