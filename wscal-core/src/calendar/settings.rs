use chrono_tz::Tz;

use crate::color::SupportedColor;
use crate::constants::DEFAULT_EVENT_MINUTES;
use crate::error::CalendarResult;
use crate::queue::QueueConfig;
use crate::time::resolve_timezone;

/// Runtime settings of a calendar context.
#[derive(Debug, Clone)]
pub struct CalendarSettings {
    /// Zone used for day boundaries and bare provider dates.
    pub timezone: Tz,
    /// Length of events created with `add_empty_event`.
    pub default_event_minutes: i64,
    pub default_color: SupportedColor,
    pub queue: QueueConfig,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        CalendarSettings {
            timezone: Tz::UTC,
            default_event_minutes: DEFAULT_EVENT_MINUTES,
            default_color: SupportedColor::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl CalendarSettings {
    /// Settings in the named zone (`"auto"` for the local one).
    pub fn in_timezone(name: &str) -> CalendarResult<Self> {
        Ok(CalendarSettings {
            timezone: resolve_timezone(name)?,
            ..Default::default()
        })
    }

    pub fn timezone_name(&self) -> &'static str {
        self.timezone.name()
    }
}
