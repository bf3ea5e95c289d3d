//! Calendar context: the operation surface a front end drives.
//!
//! A `CalendarContext` belongs to one workspace and keeps a mirror of its
//! events inside the fetched window. Edits of existing events go through an
//! `UpdateQueue`; provider reconciliation lives in `sync.rs`.

pub mod layout;
mod modal;
mod settings;
mod sync;

pub use settings::CalendarSettings;
pub use sync::SyncSummary;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::constants::NEW_EVENT_ID;
use crate::date_range::DateRange;
use crate::error::{CalendarError, CalendarResult};
use crate::event::{CalendarEvent, EventPatch, NewEvent, StoreUpdate};
use crate::provider::{CalendarProvider, ProviderDeleteOutcome, ProviderEvent};
use crate::queue::{UpdateApplier, UpdateHandle, UpdateQueue};
use crate::signature::{EventSignature, find_by_signature};
use crate::store::{EventQuery, EventStore};
use crate::time::local_day;
use modal::ModalState;

/// State shared with the queue's applier.
struct Shared {
    ws_id: String,
    store: Arc<dyn EventStore>,
    provider: Option<Arc<dyn CalendarProvider>>,
    settings: RwLock<CalendarSettings>,
    window: Option<DateRange>,
    mirror: RwLock<Vec<CalendarEvent>>,
}

impl Shared {
    fn settings(&self) -> CalendarSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn window(&self) -> CalendarResult<DateRange> {
        match &self.window {
            Some(window) => Ok(window.clone()),
            None => DateRange::dashboard_window(Utc::now(), self.settings().timezone),
        }
    }

    fn mirror(&self) -> Vec<CalendarEvent> {
        self.mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn mirrored_event(&self, event_id: &str) -> Option<CalendarEvent> {
        self.mirror
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.id == event_id)
            .cloned()
    }

    fn with_mirror<R>(&self, f: impl FnOnce(&mut Vec<CalendarEvent>) -> R) -> R {
        let mut mirror = self.mirror.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut mirror)
    }

    /// Replace a row in the mirror, or add it in start order.
    fn upsert_mirror(&self, event: CalendarEvent) {
        self.with_mirror(|mirror| match mirror.iter().position(|e| e.id == event.id) {
            Some(index) => mirror[index] = event,
            None => {
                let at = mirror.partition_point(|e| e.start_at <= event.start_at);
                mirror.insert(at, event);
            }
        });
    }

    /// Ownership check against the mirror only; never reaches the store.
    fn owned_event(&self, event_id: &str) -> CalendarResult<CalendarEvent> {
        let event = self
            .mirrored_event(event_id)
            .ok_or_else(|| CalendarError::EventNotFound(event_id.to_string()))?;
        self.check_workspace(&event)?;
        Ok(event)
    }

    fn check_workspace(&self, event: &CalendarEvent) -> CalendarResult<()> {
        if event.ws_id != self.ws_id {
            return Err(CalendarError::WrongWorkspace {
                event_id: event.id.clone(),
                ws_id: self.ws_id.clone(),
            });
        }
        Ok(())
    }

    async fn refresh(&self) -> CalendarResult<usize> {
        let query = EventQuery::workspace(&self.ws_id).in_range(self.window()?);
        let events = self.store.list(&query).await?;
        let count = events.len();
        self.with_mirror(|mirror| *mirror = events);
        tracing::debug!(ws_id = %self.ws_id, count, "Refreshed event mirror");
        Ok(count)
    }
}

/// Rejects edits a caller is not allowed to make, before anything is queued.
fn validate_patch(event: &CalendarEvent, patch: &EventPatch) -> CalendarResult<()> {
    if event.locked && !patch.only_touches_locked() {
        return Err(CalendarError::Locked(event.id.clone()));
    }

    let start_at = patch.start_at.unwrap_or(event.start_at);
    let end_at = patch.end_at.unwrap_or(event.end_at);
    if end_at <= start_at {
        return Err(CalendarError::Validation(format!(
            "Event {} must end after it starts",
            event.id
        )));
    }
    Ok(())
}

/// Writes dequeued updates and keeps the mirror current.
struct MirrorApplier {
    shared: Arc<Shared>,
}

#[async_trait]
impl UpdateApplier for MirrorApplier {
    async fn apply(&self, event_id: &str, patch: &EventPatch) -> CalendarResult<CalendarEvent> {
        // The event may have been deleted or locked since it was queued.
        let event = self.shared.owned_event(event_id)?;
        validate_patch(&event, patch)?;

        let row = self
            .shared
            .store
            .update(event_id, &StoreUpdate::from(patch.clone()))
            .await?;
        self.shared.upsert_mirror(row.clone());
        Ok(row)
    }

    async fn after_apply(&self, _event: &CalendarEvent) {
        if let Err(e) = self.shared.refresh().await {
            tracing::warn!(error = %e, "Failed to refresh events after update");
        }
    }
}

/// Result of `delete_event`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteReport {
    pub event_id: String,
    /// Set when the event was linked to a provider event.
    pub provider_outcome: Option<ProviderDeleteOutcome>,
    /// Provider failure that did not stop the local delete.
    pub provider_error: Option<String>,
}

impl DeleteReport {
    /// The provider connection must be re-authorized before the provider
    /// copy can be removed.
    pub fn needs_reauth(&self) -> bool {
        self.provider_outcome == Some(ProviderDeleteOutcome::NeedsReauth)
    }
}

pub struct CalendarContextBuilder {
    ws_id: String,
    store: Arc<dyn EventStore>,
    provider: Option<Arc<dyn CalendarProvider>>,
    settings: CalendarSettings,
    window: Option<DateRange>,
}

impl CalendarContextBuilder {
    pub fn provider(mut self, provider: Arc<dyn CalendarProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn settings(mut self, settings: CalendarSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Pin the fetched window instead of following the current month.
    pub fn window(mut self, window: DateRange) -> Self {
        self.window = Some(window);
        self
    }

    /// Build the context and load the mirror. Must run inside a tokio runtime.
    pub async fn build(self) -> CalendarResult<CalendarContext> {
        let queue_config = self.settings.queue;
        let shared = Arc::new(Shared {
            ws_id: self.ws_id,
            store: self.store,
            provider: self.provider,
            settings: RwLock::new(self.settings),
            window: self.window,
            mirror: RwLock::new(Vec::new()),
        });

        let applier = Arc::new(MirrorApplier {
            shared: Arc::clone(&shared),
        });
        let context = CalendarContext {
            queue: UpdateQueue::new(applier, queue_config),
            shared,
            modal: Mutex::new(ModalState::default()),
            create_lock: tokio::sync::Mutex::new(()),
        };

        context.refresh().await?;
        Ok(context)
    }
}

pub struct CalendarContext {
    shared: Arc<Shared>,
    queue: UpdateQueue,
    modal: Mutex<ModalState>,
    /// Serializes duplicate check and insert of new events.
    create_lock: tokio::sync::Mutex<()>,
}

impl CalendarContext {
    pub fn builder(ws_id: impl Into<String>, store: Arc<dyn EventStore>) -> CalendarContextBuilder {
        CalendarContextBuilder {
            ws_id: ws_id.into(),
            store,
            provider: None,
            settings: CalendarSettings::default(),
            window: None,
        }
    }

    pub fn ws_id(&self) -> &str {
        &self.shared.ws_id
    }

    pub fn settings(&self) -> CalendarSettings {
        self.shared.settings()
    }

    /// Takes effect for later operations. Queue timing is fixed at build time.
    pub fn update_settings(&self, settings: CalendarSettings) {
        *self
            .shared
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn window(&self) -> CalendarResult<DateRange> {
        self.shared.window()
    }

    /// Re-read the mirror from the store. Returns the number of events.
    pub async fn refresh(&self) -> CalendarResult<usize> {
        self.shared.refresh().await
    }

    fn modal(&self) -> MutexGuard<'_, ModalState> {
        self.modal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // READS:

    /// Look up an event; `"new"` resolves to the unsaved draft.
    pub fn get_event(&self, event_id: &str) -> Option<CalendarEvent> {
        if event_id == NEW_EVENT_ID {
            return self.modal().draft.clone();
        }
        self.shared.mirrored_event(event_id)
    }

    /// All mirrored events, ordered by start.
    pub fn get_events(&self) -> Vec<CalendarEvent> {
        self.shared.mirror()
    }

    /// Events on `date` (today when `None`) in the configured zone.
    pub fn get_current_events(&self, date: Option<NaiveDate>) -> Vec<CalendarEvent> {
        let tz = self.shared.settings().timezone;
        let day = date.unwrap_or_else(|| local_day(Utc::now(), tz));
        let mirror = self.shared.mirror();
        layout::events_on(&mirror, day, tz)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_upcoming_event(&self) -> Option<CalendarEvent> {
        self.get_upcoming_event_at(Utc::now())
    }

    pub fn get_upcoming_event_at(&self, now: DateTime<Utc>) -> Option<CalendarEvent> {
        let tz = self.shared.settings().timezone;
        let mirror = self.shared.mirror();
        layout::upcoming(&mirror, now, tz).cloned()
    }

    /// Display lane of an event among same-day overlapping events.
    pub fn get_event_level(&self, event_id: &str) -> usize {
        let tz = self.shared.settings().timezone;
        layout::levels(&self.shared.mirror(), tz)
            .get(event_id)
            .copied()
            .unwrap_or(0)
    }

    /// Same-day events overlapping `event`, excluding itself. A warning for
    /// the user, never a reason to refuse a save.
    pub fn find_overlaps(&self, event: &CalendarEvent) -> Vec<CalendarEvent> {
        let tz = self.shared.settings().timezone;
        let mirror = self.shared.mirror();
        layout::overlapping(&mirror, event, tz)
            .into_iter()
            .cloned()
            .collect()
    }

    // CREATE:

    /// Persist a new event, or return the existing event with the same
    /// signature.
    pub async fn add_event(&self, mut event: NewEvent) -> CalendarResult<CalendarEvent> {
        if event.ws_id.is_empty() {
            event.ws_id = self.shared.ws_id.clone();
        }
        if event.ws_id != self.shared.ws_id {
            return Err(CalendarError::WrongWorkspace {
                event_id: NEW_EVENT_ID.to_string(),
                ws_id: self.shared.ws_id.clone(),
            });
        }

        let event = event.rounded();
        event.validate()?;

        let _guard = self.create_lock.lock().await;

        let signature = EventSignature::from(&event);
        let existing = {
            let mirror = self.shared.mirror();
            find_by_signature(&mirror, &signature).cloned()
        };
        if let Some(existing) = existing {
            tracing::info!(id = %existing.id, "Event already exists, skipping insert");
            return Ok(existing);
        }

        let created = self.shared.store.insert(&event).await?;
        tracing::info!(id = %created.id, title = %created.title, "Created event");
        self.shared.upsert_mirror(created.clone());
        Ok(created)
    }

    /// Open a draft at `start_at` with the default length and color.
    pub fn add_empty_event(&self, start_at: DateTime<Utc>) -> CalendarEvent {
        let minutes = self.shared.settings().default_event_minutes;
        self.add_empty_event_with_duration(start_at, minutes)
    }

    pub fn add_empty_event_with_duration(&self, start_at: DateTime<Utc>, minutes: i64) -> CalendarEvent {
        let settings = self.shared.settings();
        let draft = CalendarEvent::draft(&self.shared.ws_id, start_at, minutes, settings.default_color);
        self.modal().open_draft(draft.clone());
        draft
    }

    // UPDATE:

    /// Validate and queue an update of a persisted event.
    ///
    /// Anything the store would have to refuse is rejected here, before
    /// anything is queued.
    pub fn submit_update(&self, event_id: &str, patch: EventPatch) -> CalendarResult<UpdateHandle> {
        if event_id == NEW_EVENT_ID {
            return Err(CalendarError::Validation(
                "Drafts are saved with update_event".into(),
            ));
        }

        let patch = patch.rounded();
        let event = self.shared.owned_event(event_id)?;
        validate_patch(&event, &patch)?;

        if patch.is_empty() {
            return Ok(UpdateHandle::ready(Ok(event)));
        }
        Ok(self.queue.submit(event_id, patch))
    }

    /// Update an event and wait for the write. For `"new"`, the patch is
    /// merged into the draft, which is then created.
    pub async fn update_event(&self, event_id: &str, patch: EventPatch) -> CalendarResult<CalendarEvent> {
        if event_id != NEW_EVENT_ID {
            return self.submit_update(event_id, patch)?.await;
        }

        let draft = {
            let mut modal = self.modal();
            let draft = modal
                .draft
                .as_mut()
                .ok_or_else(|| CalendarError::EventNotFound(NEW_EVENT_ID.to_string()))?;
            patch.rounded().apply_to(draft);
            draft.clone()
        };
        let saved = self.add_event(draft.to_new_event()).await?;
        self.modal().discard_draft();
        Ok(saved)
    }

    // DELETE:

    pub async fn delete_event(&self, event_id: &str) -> CalendarResult<DeleteReport> {
        let mut report = DeleteReport {
            event_id: event_id.to_string(),
            ..Default::default()
        };

        if event_id == NEW_EVENT_ID {
            self.modal().discard_draft();
            return Ok(report);
        }

        let event = match self.shared.mirrored_event(event_id) {
            Some(event) => event,
            None => self
                .shared
                .store
                .get(event_id)
                .await?
                .ok_or_else(|| CalendarError::EventNotFound(event_id.to_string()))?,
        };
        self.shared.check_workspace(&event)?;

        if let (Some(provider), Some(gid)) = (&self.shared.provider, event.google_event_id.as_deref()) {
            match provider.delete_event(&self.shared.ws_id, gid).await {
                Ok(outcome) => {
                    if outcome == ProviderDeleteOutcome::NeedsReauth {
                        tracing::warn!(id = event_id, "Provider needs re-authorization; deleting locally only");
                    }
                    report.provider_outcome = Some(outcome);
                }
                Err(e) => {
                    tracing::warn!(id = event_id, error = %e, "Provider delete failed; deleting locally only");
                    report.provider_error = Some(e.to_string());
                }
            }
        }

        self.shared.store.delete(event_id).await?;
        self.shared.with_mirror(|mirror| mirror.retain(|e| e.id != event_id));

        let mut modal = self.modal();
        if modal.is_active(event_id) {
            modal.close();
        }
        tracing::info!(id = event_id, "Deleted event");
        Ok(report)
    }

    // MODAL:

    /// Open the editor on an event, or on a fresh one-hour draft.
    pub fn open_modal(&self, event_id: Option<&str>) {
        match event_id {
            Some(id) => self.modal().open_existing(id),
            None => {
                let color = self.shared.settings().default_color;
                let draft = CalendarEvent::draft(
                    &self.shared.ws_id,
                    Utc::now(),
                    crate::constants::DEFAULT_EVENT_MINUTES,
                    color,
                );
                self.modal().open_draft(draft);
            }
        }
    }

    pub fn close_modal(&self) {
        self.modal().close();
    }

    pub fn hide_modal(&self) {
        self.modal().hidden = true;
    }

    pub fn show_modal(&self) {
        self.modal().hidden = false;
    }

    pub fn is_modal_open(&self) -> bool {
        self.modal().is_open()
    }

    pub fn is_editing(&self) -> bool {
        self.modal().active_event_id.is_some()
    }

    /// The event under edit, whether or not the editor is hidden.
    pub fn active_event(&self) -> Option<CalendarEvent> {
        let active = self.modal().active_event_id.clone()?;
        self.get_event(&active)
    }

    pub fn get_modal_status(&self, event_id: &str) -> bool {
        let modal = self.modal();
        !modal.hidden && modal.is_active(event_id)
    }

    /// The event under edit while the editor is visible.
    pub fn get_active_event(&self) -> Option<CalendarEvent> {
        if self.modal().hidden {
            return None;
        }
        self.active_event()
    }

    // PROVIDER:

    fn provider(&self) -> CalendarResult<&Arc<dyn CalendarProvider>> {
        self.shared
            .provider
            .as_ref()
            .ok_or_else(|| CalendarError::NotSupported("No calendar provider configured".into()))
    }

    /// Push a local event to the provider and link the two.
    pub async fn push_event(&self, event_id: &str) -> CalendarResult<ProviderEvent> {
        let provider = self.provider()?;
        let event = self.shared.owned_event(event_id)?;

        let pushed = provider.push_event(&self.shared.ws_id, &event).await?;
        if !event.is_mirrored() && !pushed.id.is_empty() {
            let row = self
                .shared
                .store
                .update(event_id, &StoreUpdate::adopt_provider_id(&pushed.id))
                .await?;
            self.shared.upsert_mirror(row);
        }
        tracing::info!(id = event_id, provider_id = %pushed.id, "Pushed event to provider");
        Ok(pushed)
    }

    pub async fn auth_url(&self) -> CalendarResult<String> {
        self.provider()?.auth_url(&self.shared.ws_id).await
    }

    /// Reject every queued update with `Cancelled` and stop accepting new ones.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }

    #[cfg(test)]
    fn seed_mirror(&self, events: Vec<CalendarEvent>) {
        self.shared.with_mirror(|mirror| *mirror = events);
    }
}
