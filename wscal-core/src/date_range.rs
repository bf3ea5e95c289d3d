//! Date range for fetching events.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::{CalendarError, CalendarResult};
use crate::time::{iso_string, local_midnight};

/// Date range for fetching events.
/// None values mean unbounded in that direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        DateRange {
            from: Some(from),
            to: Some(to),
        }
    }

    /// The window the dashboard keeps in memory: from the first day of the
    /// previous month through the last day of the next month, in `tz`.
    pub fn dashboard_window(now: DateTime<Utc>, tz: Tz) -> CalendarResult<Self> {
        let today = now.with_timezone(&tz).date_naive();
        let this_month = first_of_month(today)?;

        let start = this_month
            .checked_sub_months(Months::new(1))
            .ok_or_else(|| window_error(today))?;
        // First day of the month after next; the window ends just before it.
        let after = this_month
            .checked_add_months(Months::new(2))
            .ok_or_else(|| window_error(today))?;

        Ok(DateRange::new(
            local_midnight(start, tz),
            local_midnight(after, tz) - Duration::milliseconds(1),
        ))
    }

    /// Parse `YYYY-MM-DD` bounds; the end date is inclusive.
    pub fn from_args(from: Option<&str>, to: Option<&str>) -> CalendarResult<Self> {
        Ok(DateRange {
            from: from.map(parse_date_start).transpose()?,
            to: to.map(parse_date_end).transpose()?,
        })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| instant >= from) && self.to.is_none_or(|to| instant <= to)
    }

    /// Get `from` as an ISO string, using the epoch if unbounded.
    pub fn from_rfc3339(&self) -> String {
        iso_string(self.from.unwrap_or(DateTime::UNIX_EPOCH))
    }

    /// Get `to` as an ISO string, using a far future date if unbounded.
    pub fn to_rfc3339(&self) -> String {
        let far_future = NaiveDate::from_ymd_opt(2100, 1, 1)
            .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        iso_string(self.to.unwrap_or(far_future))
    }
}

fn first_of_month(date: NaiveDate) -> CalendarResult<NaiveDate> {
    date.with_day(1).ok_or_else(|| window_error(date))
}

fn window_error(date: NaiveDate) -> CalendarError {
    CalendarError::Validation(format!("Cannot compute fetch window around {date}"))
}

/// Parse YYYY-MM-DD as start of day in UTC
fn parse_date_start(s: &str) -> CalendarResult<DateTime<Utc>> {
    let date = parse_date(s)?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Parse YYYY-MM-DD as end of day in UTC
fn parse_date_end(s: &str) -> CalendarResult<DateTime<Utc>> {
    let date = parse_date(s)?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc() + Duration::days(1)
        - Duration::milliseconds(1))
}

fn parse_date(s: &str) -> CalendarResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        CalendarError::Validation(format!("Invalid date format '{s}'. Expected YYYY-MM-DD"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_dashboard_window_in_utc() {
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap();
        let range = DateRange::dashboard_window(now, Tz::UTC).unwrap();

        assert_eq!(range.from_rfc3339(), "2024-04-01T00:00:00.000Z");
        assert_eq!(range.to_rfc3339(), "2024-06-30T23:59:59.999Z");
    }

    #[test]
    fn test_dashboard_window_ends_with_next_month() {
        // Jan 31st: next month is a short February.
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        let range = DateRange::dashboard_window(now, Tz::UTC).unwrap();

        assert_eq!(range.to_rfc3339(), "2024-02-29T23:59:59.999Z");
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap()));
        assert!(!range.contains(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_dashboard_window_crosses_year_boundaries() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let range = DateRange::dashboard_window(now, Tz::UTC).unwrap();
        assert_eq!(range.from_rfc3339(), "2023-12-01T00:00:00.000Z");

        let now = Utc.with_ymd_and_hms(2024, 12, 10, 0, 0, 0).unwrap();
        let range = DateRange::dashboard_window(now, Tz::UTC).unwrap();
        assert_eq!(range.to_rfc3339(), "2025-01-31T23:59:59.999Z");
    }

    #[test]
    fn test_dashboard_window_uses_local_month() {
        // Still April 30th in New York.
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap();
        let range = DateRange::dashboard_window(now, chrono_tz::America::New_York).unwrap();

        assert_eq!(range.from_rfc3339(), "2024-03-01T05:00:00.000Z");
        assert_eq!(range.to_rfc3339(), "2024-06-01T03:59:59.999Z");
    }

    #[test]
    fn test_from_args() {
        let range = DateRange::from_args(Some("2024-01-01"), Some("2024-01-31")).unwrap();
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 1, 31, 23, 0, 0).unwrap()));
        assert!(!range.contains(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()));

        assert!(DateRange::from_args(Some("01/01/2024"), None).is_err());
    }
}
