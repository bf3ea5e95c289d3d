//! Workspace calendar event types.
//!
//! `CalendarEvent` is a row of the remote events table. Writes never send a
//! whole event: inserts go through `NewEvent` and updates through
//! `EventPatch`, which only carries the fields a caller may change.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::color::SupportedColor;
use crate::constants::NEW_EVENT_ID;
use crate::error::{CalendarError, CalendarResult};
use crate::time::{TimeRange, is_all_day_event, round_to_nearest_15_minutes};

/// A calendar event as stored for a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: SupportedColor,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locked: bool,
    #[serde(default)]
    pub google_event_id: Option<String>,
    pub ws_id: String,
}

impl CalendarEvent {
    /// A client-side draft that has not been persisted yet.
    pub fn draft(ws_id: &str, start_at: DateTime<Utc>, minutes: i64, color: SupportedColor) -> Self {
        let start_at = round_to_nearest_15_minutes(start_at);
        CalendarEvent {
            id: NEW_EVENT_ID.to_string(),
            title: String::new(),
            description: String::new(),
            location: String::new(),
            start_at,
            end_at: start_at + Duration::minutes(minutes.max(1)),
            color,
            locked: false,
            google_event_id: None,
            ws_id: ws_id.to_string(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id == NEW_EVENT_ID
    }

    /// Whether the event is linked to a provider event.
    pub fn is_mirrored(&self) -> bool {
        self.google_event_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_at, self.end_at)
    }

    pub fn is_all_day(&self) -> bool {
        is_all_day_event(self.start_at, self.end_at)
    }

    /// Insert payload carrying this event's content.
    pub fn to_new_event(&self) -> NewEvent {
        NewEvent {
            ws_id: self.ws_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            start_at: self.start_at,
            end_at: self.end_at,
            color: self.color,
            locked: self.locked,
            google_event_id: self.google_event_id.clone(),
        }
    }
}

/// Columns written when inserting an event. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub ws_id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub color: SupportedColor,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_event_id: Option<String>,
}

impl NewEvent {
    pub fn validate(&self) -> CalendarResult<()> {
        if self.end_at <= self.start_at {
            return Err(CalendarError::Validation(format!(
                "Event '{}' must end after it starts",
                self.title
            )));
        }
        Ok(())
    }

    pub fn rounded(mut self) -> Self {
        self.start_at = round_to_nearest_15_minutes(self.start_at);
        self.end_at = round_to_nearest_15_minutes(self.end_at);
        self
    }

    /// Materialize as a stored row with the given id.
    pub fn into_event(self, id: String) -> CalendarEvent {
        CalendarEvent {
            id,
            title: self.title,
            description: self.description,
            location: self.location,
            start_at: self.start_at,
            end_at: self.end_at,
            color: self.color,
            locked: self.locked,
            google_event_id: self.google_event_id,
            ws_id: self.ws_id,
        }
    }
}

/// Fields a caller may change on an existing event.
///
/// System columns (`id`, `ws_id`, `google_event_id`) are not representable here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<SupportedColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        *self == EventPatch::default()
    }

    pub fn rounded(mut self) -> Self {
        self.start_at = self.start_at.map(round_to_nearest_15_minutes);
        self.end_at = self.end_at.map(round_to_nearest_15_minutes);
        self
    }

    /// Fold a later patch into this one; fields set in `later` win.
    pub fn merge(&mut self, later: EventPatch) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if later.$field.is_some() { self.$field = later.$field; })*
            };
        }
        take!(title, description, location, start_at, end_at, color, locked);
    }

    pub fn apply_to(&self, event: &mut CalendarEvent) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(description) = &self.description {
            event.description = description.clone();
        }
        if let Some(location) = &self.location {
            event.location = location.clone();
        }
        if let Some(start_at) = self.start_at {
            event.start_at = start_at;
        }
        if let Some(end_at) = self.end_at {
            event.end_at = end_at;
        }
        if let Some(color) = self.color {
            event.color = color;
        }
        if let Some(locked) = self.locked {
            event.locked = locked;
        }
    }

    /// The patch toggles the lock and nothing else.
    pub fn only_touches_locked(&self) -> bool {
        self.locked.is_some()
            && EventPatch {
                locked: None,
                ..self.clone()
            }
            .is_empty()
    }
}

/// Body of a store update. Reconciliation may also link a provider id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreUpdate {
    #[serde(flatten)]
    pub patch: EventPatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_event_id: Option<String>,
}

impl StoreUpdate {
    pub fn adopt_provider_id(google_event_id: impl Into<String>) -> Self {
        StoreUpdate {
            patch: EventPatch::default(),
            google_event_id: Some(google_event_id.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patch.is_empty() && self.google_event_id.is_none()
    }

    pub fn apply_to(&self, event: &mut CalendarEvent) {
        self.patch.apply_to(event);
        if let Some(id) = &self.google_event_id {
            event.google_event_id = Some(id.clone());
        }
    }
}

impl From<EventPatch> for StoreUpdate {
    fn from(patch: EventPatch) -> Self {
        StoreUpdate {
            patch,
            google_event_id: None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
