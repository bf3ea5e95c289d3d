//! Scripted in-memory provider.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::date_range::DateRange;
use crate::error::{CalendarError, CalendarResult};
use crate::event::CalendarEvent;
use crate::provider::{CalendarProvider, ProviderDeleteOutcome, ProviderEvent};

/// A provider whose event set is set by the caller.
///
/// Records fetches, deletes and pushes so tests can assert on them.
#[derive(Default)]
pub struct MemoryProvider {
    state: Mutex<ProviderState>,
}

#[derive(Default)]
struct ProviderState {
    events: Vec<ProviderEvent>,
    fetches: Vec<bool>,
    deleted: Vec<String>,
    pushed: Vec<ProviderEvent>,
    delete_outcome: Option<ProviderDeleteOutcome>,
    fail_fetch: Option<String>,
}

impl MemoryProvider {
    pub fn new(events: Vec<ProviderEvent>) -> Self {
        MemoryProvider {
            state: Mutex::new(ProviderState {
                events,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_events(&self, events: Vec<ProviderEvent>) {
        self.lock().events = events;
    }

    /// Answer every delete with `outcome` instead of removing the event.
    pub fn set_delete_outcome(&self, outcome: Option<ProviderDeleteOutcome>) {
        self.lock().delete_outcome = outcome;
    }

    /// Make fetches fail with a provider error carrying `message`.
    pub fn fail_fetch(&self, message: Option<&str>) {
        self.lock().fail_fetch = message.map(String::from);
    }

    /// One entry per fetch: whether it was forced.
    pub fn fetches(&self) -> Vec<bool> {
        self.lock().fetches.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    pub fn pushed(&self) -> Vec<ProviderEvent> {
        self.lock().pushed.clone()
    }
}

#[async_trait]
impl CalendarProvider for MemoryProvider {
    async fn list_events(
        &self,
        _ws_id: &str,
        _range: &DateRange,
        force_refresh: bool,
    ) -> CalendarResult<Vec<ProviderEvent>> {
        let mut state = self.lock();
        state.fetches.push(force_refresh);
        if let Some(message) = &state.fail_fetch {
            return Err(CalendarError::Provider(message.clone()));
        }
        Ok(state.events.clone())
    }

    async fn delete_event(
        &self,
        _ws_id: &str,
        provider_event_id: &str,
    ) -> CalendarResult<ProviderDeleteOutcome> {
        let mut state = self.lock();
        state.deleted.push(provider_event_id.to_string());

        if let Some(outcome) = state.delete_outcome {
            return Ok(outcome);
        }

        let before = state.events.len();
        state.events.retain(|e| e.id != provider_event_id);
        if state.events.len() < before {
            Ok(ProviderDeleteOutcome::Deleted)
        } else {
            Ok(ProviderDeleteOutcome::NotFound)
        }
    }

    async fn push_event(&self, _ws_id: &str, event: &CalendarEvent) -> CalendarResult<ProviderEvent> {
        let mut state = self.lock();
        let mut pushed = ProviderEvent::from_event(event);
        if pushed.id.is_empty() {
            pushed.id = format!("mem-{}", uuid::Uuid::new_v4());
        }

        state.events.retain(|e| e.id != pushed.id);
        state.events.push(pushed.clone());
        state.pushed.push(pushed.clone());
        Ok(pushed)
    }

    async fn auth_url(&self, ws_id: &str) -> CalendarResult<String> {
        Err(CalendarError::NotSupported(format!(
            "in-memory provider has no authorization flow (workspace {ws_id})"
        )))
    }
}
