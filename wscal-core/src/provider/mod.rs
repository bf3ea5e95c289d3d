//! Third-party calendar provider.
//!
//! Provider events arrive in Google Calendar's shape: timed events carry
//! `start.dateTime`, all-day events only `start.date`.

mod http;
mod memory;

pub use http::HttpProvider;
pub use memory::MemoryProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::color::SupportedColor;
use crate::date_range::DateRange;
use crate::error::CalendarResult;
use crate::event::{CalendarEvent, NewEvent};
use crate::time::{ProviderRange, convert_provider_all_day_range};

const CANCELLED: &str = "cancelled";

/// Start or end of a provider event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// Bare `YYYY-MM-DD` for all-day events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl ProviderTime {
    pub fn date_time(value: impl Into<String>) -> Self {
        ProviderTime {
            date_time: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn date(value: impl Into<String>) -> Self {
        ProviderTime {
            date: Some(value.into()),
            ..Default::default()
        }
    }

    fn value(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEvent {
    pub id: String,
    #[serde(default, alias = "title")]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start: ProviderTime,
    #[serde(default)]
    pub end: ProviderTime,
    #[serde(default, alias = "color")]
    pub color_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ProviderEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some(CANCELLED)
    }

    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or_default()
    }

    pub fn color(&self) -> SupportedColor {
        SupportedColor::from_provider(self.color_id.as_deref())
    }

    /// Start/end as they should be persisted, resolving bare dates in `tz`.
    pub fn range(&self, tz: Option<&str>) -> CalendarResult<ProviderRange> {
        convert_provider_all_day_range(self.start.value(), self.end.value(), tz)
    }

    /// Insert payload for this event in `ws_id`.
    pub fn to_new_event(&self, ws_id: &str, tz: Option<&str>) -> CalendarResult<NewEvent> {
        let range = self.range(tz)?.parse()?;
        Ok(NewEvent {
            ws_id: ws_id.to_string(),
            title: self.title().to_string(),
            description: self.description().to_string(),
            location: self.location().to_string(),
            start_at: range.start_at,
            end_at: range.end_at,
            color: self.color(),
            locked: false,
            google_event_id: Some(self.id.clone()),
        })
    }

    /// Provider representation of a local event.
    pub fn from_event(event: &CalendarEvent) -> Self {
        ProviderEvent {
            id: event.google_event_id.clone().unwrap_or_default(),
            summary: Some(event.title.clone()),
            description: Some(event.description.clone()),
            location: Some(event.location.clone()),
            start: ProviderTime::date_time(crate::time::iso_string(event.start_at)),
            end: ProviderTime::date_time(crate::time::iso_string(event.end_at)),
            color_id: Some(event.color.google_color_id().to_string()),
            status: None,
        }
    }
}

/// What happened when the provider was asked to delete an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderDeleteOutcome {
    Deleted,
    /// Already gone on the provider side.
    NotFound,
    /// The provider connection must be re-authorized.
    NeedsReauth,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Events of `ws_id` within `range`. `force_refresh` bypasses any cache.
    async fn list_events(
        &self,
        ws_id: &str,
        range: &DateRange,
        force_refresh: bool,
    ) -> CalendarResult<Vec<ProviderEvent>>;

    async fn delete_event(
        &self,
        ws_id: &str,
        provider_event_id: &str,
    ) -> CalendarResult<ProviderDeleteOutcome>;

    /// Push a local event to the provider, returning the provider's copy.
    async fn push_event(&self, ws_id: &str, event: &CalendarEvent) -> CalendarResult<ProviderEvent>;

    /// URL the user visits to connect or re-authorize the provider.
    async fn auth_url(&self, ws_id: &str) -> CalendarResult<String>;
}
