//! In-memory event store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{CalendarError, CalendarResult};
use crate::event::{CalendarEvent, NewEvent, StoreUpdate};
use crate::store::{EventQuery, EventStore};

/// An `EventStore` held in process memory.
///
/// Counts every call and every row written, and can be told to fail specific
/// operations, so callers can assert exactly what reached the store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    events: Vec<CalendarEvent>,
    next_id: u64,
    calls: usize,
    writes: usize,
    update_log: Vec<(String, StoreUpdate)>,
    failing_updates: HashMap<String, u32>,
    fail_batch_inserts: bool,
    fail_batch_deletes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with existing rows. Seeding is not counted.
    pub fn with_events(events: impl IntoIterator<Item = CalendarEvent>) -> Self {
        let store = Self::new();
        store.lock().events.extend(events);
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of store operations issued, reads included.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Number of mutating operations issued.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Every successful update, in the order it was applied.
    pub fn update_log(&self) -> Vec<(String, StoreUpdate)> {
        self.lock().update_log.clone()
    }

    /// Snapshot of all rows, in insertion order.
    pub fn events(&self) -> Vec<CalendarEvent> {
        self.lock().events.clone()
    }

    pub fn event(&self, id: &str) -> Option<CalendarEvent> {
        self.lock().events.iter().find(|e| e.id == id).cloned()
    }

    /// Make the next `times` updates of `id` fail.
    pub fn fail_updates(&self, id: &str, times: u32) {
        self.lock().failing_updates.insert(id.to_string(), times);
    }

    pub fn fail_batch_inserts(&self, fail: bool) {
        self.lock().fail_batch_inserts = fail;
    }

    pub fn fail_batch_deletes(&self, fail: bool) {
        self.lock().fail_batch_deletes = fail;
    }
}

impl MemoryState {
    fn insert(&mut self, event: &NewEvent) -> CalendarEvent {
        self.next_id += 1;
        let row = event.clone().into_event(format!("evt-{}", self.next_id));
        self.events.push(row.clone());
        row
    }

    fn remove(&mut self, id: &str) {
        self.events.retain(|e| e.id != id);
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn list(&self, query: &EventQuery) -> CalendarResult<Vec<CalendarEvent>> {
        let mut state = self.lock();
        state.calls += 1;

        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start_at);
        Ok(events)
    }

    async fn get(&self, id: &str) -> CalendarResult<Option<CalendarEvent>> {
        let mut state = self.lock();
        state.calls += 1;
        Ok(state.events.iter().find(|e| e.id == id).cloned())
    }

    async fn insert(&self, event: &NewEvent) -> CalendarResult<CalendarEvent> {
        let mut state = self.lock();
        state.calls += 1;
        state.writes += 1;
        Ok(state.insert(event))
    }

    async fn insert_many(&self, events: &[NewEvent]) -> CalendarResult<Vec<CalendarEvent>> {
        let mut state = self.lock();
        state.calls += 1;
        if state.fail_batch_inserts {
            return Err(CalendarError::Store("batch insert rejected".into()));
        }
        state.writes += 1;
        Ok(events.iter().map(|e| state.insert(e)).collect())
    }

    async fn update(&self, id: &str, update: &StoreUpdate) -> CalendarResult<CalendarEvent> {
        let mut state = self.lock();
        state.calls += 1;

        if let Some(remaining) = state.failing_updates.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CalendarError::Store(format!("update of {id} rejected")));
            }
        }

        state.writes += 1;
        let row = state
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CalendarError::EventNotFound(id.to_string()))?;
        update.apply_to(row);
        let row = row.clone();
        state.update_log.push((id.to_string(), update.clone()));
        Ok(row)
    }

    async fn upsert_mirrored(&self, events: &[NewEvent]) -> CalendarResult<usize> {
        let mut state = self.lock();
        state.calls += 1;
        state.writes += 1;

        for event in events {
            let existing = state.events.iter().position(|e| {
                e.ws_id == event.ws_id
                    && e.google_event_id.is_some()
                    && e.google_event_id == event.google_event_id
            });
            match existing {
                Some(index) => {
                    let id = state.events[index].id.clone();
                    state.events[index] = event.clone().into_event(id);
                }
                None => {
                    state.insert(event);
                }
            }
        }
        Ok(events.len())
    }

    async fn delete(&self, id: &str) -> CalendarResult<()> {
        let mut state = self.lock();
        state.calls += 1;
        state.writes += 1;
        state.remove(id);
        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> CalendarResult<()> {
        let mut state = self.lock();
        state.calls += 1;
        if state.fail_batch_deletes {
            return Err(CalendarError::Store("batch delete rejected".into()));
        }
        state.writes += 1;
        for id in ids {
            state.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::SupportedColor;
    use crate::event::EventPatch;
    use chrono::{TimeZone, Utc};

    fn new_event(ws: &str, title: &str, gid: Option<&str>) -> NewEvent {
        NewEvent {
            ws_id: ws.into(),
            title: title.into(),
            description: String::new(),
            location: String::new(),
            start_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            color: SupportedColor::Blue,
            locked: false,
            google_event_id: gid.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_list_filters_by_workspace_and_mirror() {
        let store = MemoryStore::new();
        store.insert(&new_event("a", "one", None)).await.unwrap();
        store.insert(&new_event("a", "two", Some("g2"))).await.unwrap();
        store.insert(&new_event("b", "three", Some("g3"))).await.unwrap();

        let all = store.list(&EventQuery::workspace("a")).await.unwrap();
        assert_eq!(all.len(), 2);

        let mirrored = store.list(&EventQuery::workspace("a").mirrored()).await.unwrap();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].title, "two");
    }

    #[tokio::test]
    async fn test_update_failures_are_consumed() {
        let store = MemoryStore::new();
        let row = store.insert(&new_event("a", "one", None)).await.unwrap();
        store.fail_updates(&row.id, 1);

        let update = StoreUpdate::from(EventPatch {
            title: Some("renamed".into()),
            ..Default::default()
        });
        assert!(store.update(&row.id, &update).await.is_err());
        assert_eq!(store.update(&row.id, &update).await.unwrap().title, "renamed");
        assert_eq!(store.update_log().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_merges_on_provider_id() {
        let store = MemoryStore::new();
        let row = store.insert(&new_event("a", "old", Some("g1"))).await.unwrap();

        let written = store
            .upsert_mirrored(&[new_event("a", "new", Some("g1")), new_event("a", "x", Some("g2"))])
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.event(&row.id).unwrap().title, "new");
        assert_eq!(store.events().len(), 2);
    }
}
