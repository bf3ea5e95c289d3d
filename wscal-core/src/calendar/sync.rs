//! Provider synchronization entry points of `CalendarContext`.

use crate::error::{CalendarError, CalendarResult};
use crate::event::{CalendarEvent, NewEvent};
use crate::provider::ProviderEvent;
use crate::store::EventQuery;
use crate::sync::{
    Progress, ReconcileOutcome, Reconciler, SyncPhase, SyncPlan, SyncProgress, ignore_progress,
};

use super::CalendarContext;

/// Result of `full_sync`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSummary {
    pub success: bool,
    /// Mirrored events before and after.
    pub before: usize,
    pub after: usize,
    pub added: usize,
    pub removed: usize,
    pub changes_made: bool,
    pub message: Option<String>,
}

impl CalendarContext {
    async fn fetch_provider_events(
        &self,
        force_refresh: bool,
        progress: Progress<'_>,
    ) -> CalendarResult<Vec<ProviderEvent>> {
        let provider = self.provider()?;
        let window = self.shared.window()?;

        progress(SyncProgress::new(SyncPhase::Fetch, 0, 1));
        let events = provider
            .list_events(&self.shared.ws_id, &window, force_refresh)
            .await?;
        progress(SyncProgress::new(SyncPhase::Fetch, 1, 1));
        tracing::debug!(count = events.len(), force_refresh, "Fetched provider events");
        Ok(events)
    }

    async fn local_window_events(&self) -> CalendarResult<Vec<CalendarEvent>> {
        let query = EventQuery::workspace(&self.shared.ws_id).in_range(self.shared.window()?);
        self.shared.store.list(&query).await
    }

    async fn reconcile_with_provider(
        &self,
        force_refresh: bool,
        progress: Progress<'_>,
    ) -> CalendarResult<ReconcileOutcome> {
        let provider_events = self.fetch_provider_events(force_refresh, progress).await?;
        let local_events = self.local_window_events().await?;
        let settings = self.shared.settings();

        let outcome = Reconciler::new(self.shared.store.as_ref())
            .reconcile(
                &self.shared.ws_id,
                &provider_events,
                &local_events,
                Some(settings.timezone_name()),
                progress,
            )
            .await;

        if outcome.changes_made() {
            self.refresh().await?;
        }
        Ok(outcome)
    }

    /// What a sync would write, without writing anything.
    pub async fn plan_provider_sync(&self) -> CalendarResult<SyncPlan> {
        let provider_events = self
            .fetch_provider_events(false, &ignore_progress)
            .await?;
        let local_events = self.local_window_events().await?;
        let settings = self.shared.settings();
        Ok(SyncPlan::build(
            &self.shared.ws_id,
            &provider_events,
            &local_events,
            Some(settings.timezone_name()),
        ))
    }

    /// Reconcile the provider into the store. Returns whether anything changed.
    ///
    /// Failures are reported through `progress` as a `complete` update with a
    /// status message and never surface as errors.
    pub async fn sync_provider_now(&self, progress: Progress<'_>) -> bool {
        match self.reconcile_with_provider(false, progress).await {
            Ok(outcome) => outcome.changes_made(),
            Err(e) => {
                tracing::warn!(ws_id = %self.shared.ws_id, error = %e, "Provider sync failed");
                progress(SyncProgress::complete(false, Some(e.to_string())));
                false
            }
        }
    }

    /// Reconcile with a forced fetch and report how the mirrored set moved.
    ///
    /// Both counts are read from the store, so writes made by other clients
    /// since the last refresh do not skew the delta.
    pub async fn full_sync(&self, progress: Progress<'_>) -> SyncSummary {
        let before = match self.stored_mirrored_events().await {
            Ok(rows) => rows.len(),
            Err(e) => return self.full_sync_failed(e, 0, false, progress),
        };

        let outcome = match self.reconcile_with_provider(true, progress).await {
            Ok(outcome) => outcome,
            Err(e) => return self.full_sync_failed(e, before, false, progress),
        };
        let after = match self.stored_mirrored_events().await {
            Ok(rows) => rows.len(),
            Err(e) => return self.full_sync_failed(e, before, outcome.changes_made(), progress),
        };

        tracing::info!(
            before,
            after,
            failed = outcome.failed,
            "Full sync finished"
        );
        SyncSummary {
            success: true,
            before,
            after,
            added: after.saturating_sub(before),
            removed: before.saturating_sub(after),
            changes_made: outcome.changes_made(),
            message: (outcome.failed > 0)
                .then(|| format!("{} change(s) could not be written", outcome.failed)),
        }
    }

    fn full_sync_failed(
        &self,
        error: CalendarError,
        before: usize,
        changes_made: bool,
        progress: Progress<'_>,
    ) -> SyncSummary {
        tracing::warn!(ws_id = %self.shared.ws_id, error = %error, "Full sync failed");
        let message = error.to_string();
        progress(SyncProgress::complete(changes_made, Some(message.clone())));
        SyncSummary {
            before,
            after: before,
            changes_made,
            message: Some(message),
            ..Default::default()
        }
    }

    /// Write provider events straight into the store keyed by provider id.
    ///
    /// Never deletes and never adopts unmirrored events.
    pub async fn quick_sync(&self, progress: Progress<'_>) -> bool {
        match self.upsert_from_provider(progress).await {
            Ok(changed) => {
                progress(SyncProgress::complete(changed, None));
                changed
            }
            Err(e) => {
                tracing::warn!(ws_id = %self.shared.ws_id, error = %e, "Quick sync failed");
                progress(SyncProgress::complete(false, Some(e.to_string())));
                false
            }
        }
    }

    async fn upsert_from_provider(&self, progress: Progress<'_>) -> CalendarResult<bool> {
        progress(SyncProgress::new(SyncPhase::Get, 0, 1));
        let existing = self.stored_mirrored_events().await?;
        progress(SyncProgress::new(SyncPhase::Get, 1, 1));

        let provider_events = self.fetch_provider_events(false, progress).await?;
        let settings = self.shared.settings();
        let tz = Some(settings.timezone_name());

        let rows: Vec<NewEvent> = provider_events
            .iter()
            .filter(|e| !e.id.is_empty() && !e.is_cancelled())
            .filter_map(|e| match e.to_new_event(&self.shared.ws_id, tz) {
                Ok(row) if row.end_at > row.start_at => Some(row),
                Ok(_) => None,
                Err(err) => {
                    tracing::warn!(provider_id = %e.id, error = %err, "Skipping provider event");
                    None
                }
            })
            .collect();

        progress(SyncProgress::new(SyncPhase::Upsert, 0, rows.len()));
        let written = if rows.is_empty() {
            0
        } else {
            self.shared.store.upsert_mirrored(&rows).await?
        };
        progress(SyncProgress::new(SyncPhase::Upsert, rows.len(), rows.len()).with_changes(written > 0));

        let changed = written > 0 && differs(&existing, &rows);
        self.refresh().await?;
        tracing::info!(written, existing = existing.len(), "Quick sync finished");
        Ok(changed)
    }

    /// Provider-linked rows of the workspace inside the window, read from the store.
    async fn stored_mirrored_events(&self) -> CalendarResult<Vec<CalendarEvent>> {
        let query = EventQuery::workspace(&self.shared.ws_id)
            .in_range(self.shared.window()?)
            .mirrored();
        self.shared.store.list(&query).await
    }
}

/// Whether upserting `rows` changes any of the `existing` mirrored events.
fn differs(existing: &[CalendarEvent], rows: &[NewEvent]) -> bool {
    rows.iter().any(|row| {
        !existing.iter().any(|e| {
            e.google_event_id == row.google_event_id
                && e.title == row.title
                && e.description == row.description
                && e.location == row.location
                && e.start_at == row.start_at
                && e.end_at == row.end_at
                && e.color == row.color
        })
    })
}
