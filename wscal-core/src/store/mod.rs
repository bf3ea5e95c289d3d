//! Remote event store.
//!
//! The events table lives in a hosted relational database. Everything here
//! talks to it through `EventStore`, so the facade and the reconciliation
//! engine can run against `RestStore` in production and `MemoryStore` in tests.

mod memory;
mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

use async_trait::async_trait;

use crate::date_range::DateRange;
use crate::error::CalendarResult;
use crate::event::{CalendarEvent, NewEvent, StoreUpdate};

/// Filter for listing events of one workspace.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub ws_id: String,
    /// Events overlapping this range (inclusive on both ends).
    pub range: DateRange,
    /// Only events linked to a provider event.
    pub mirrored_only: bool,
}

impl EventQuery {
    pub fn workspace(ws_id: impl Into<String>) -> Self {
        EventQuery {
            ws_id: ws_id.into(),
            range: DateRange {
                from: None,
                to: None,
            },
            mirrored_only: false,
        }
    }

    pub fn in_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn mirrored(mut self) -> Self {
        self.mirrored_only = true;
        self
    }

    pub fn matches(&self, event: &CalendarEvent) -> bool {
        event.ws_id == self.ws_id
            && (!self.mirrored_only || event.is_mirrored())
            && self.range.to.is_none_or(|to| event.start_at <= to)
            && self.range.from.is_none_or(|from| event.end_at >= from)
    }
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Matching events, ordered by start time.
    async fn list(&self, query: &EventQuery) -> CalendarResult<Vec<CalendarEvent>>;

    /// Look up an event by id regardless of workspace.
    async fn get(&self, id: &str) -> CalendarResult<Option<CalendarEvent>>;

    async fn insert(&self, event: &NewEvent) -> CalendarResult<CalendarEvent>;

    /// Insert a batch in one request. Fails as a whole.
    async fn insert_many(&self, events: &[NewEvent]) -> CalendarResult<Vec<CalendarEvent>>;

    /// Apply an update and return the stored row. Errors with
    /// `EventNotFound` when no row has this id.
    async fn update(&self, id: &str, update: &StoreUpdate) -> CalendarResult<CalendarEvent>;

    /// Insert or merge events keyed by `(ws_id, google_event_id)`.
    /// Returns the number of rows written.
    async fn upsert_mirrored(&self, events: &[NewEvent]) -> CalendarResult<usize>;

    async fn delete(&self, id: &str) -> CalendarResult<()>;

    /// Delete a batch in one request. Fails as a whole.
    async fn delete_many(&self, ids: &[String]) -> CalendarResult<()>;
}
