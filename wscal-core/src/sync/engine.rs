//! Applies a `SyncPlan` to the event store in bounded batches.

use crate::constants::{DELETE_BATCH_SIZE, INSERT_BATCH_SIZE, UPDATE_BATCH_SIZE};
use crate::event::CalendarEvent;
use crate::provider::ProviderEvent;
use crate::store::EventStore;
use crate::sync::{Progress, RetryPolicy, SyncPhase, SyncPlan, SyncProgress, UpdateKind};

/// What a reconciliation run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub adopted: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl ReconcileOutcome {
    pub fn changes_made(&self) -> bool {
        self.inserted + self.updated + self.adopted + self.deleted > 0
    }
}

pub struct Reconciler<'a> {
    store: &'a dyn EventStore,
    retry: RetryPolicy,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn EventStore) -> Self {
        Reconciler {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Fold `provider_events` into the local mirror of `ws_id`, then report
    /// `complete`.
    pub async fn reconcile(
        &self,
        ws_id: &str,
        provider_events: &[ProviderEvent],
        local_events: &[CalendarEvent],
        tz: Option<&str>,
        progress: Progress<'_>,
    ) -> ReconcileOutcome {
        let plan = SyncPlan::build(ws_id, provider_events, local_events, tz);
        let (created, updated, deleted) = plan.counts();
        tracing::info!(ws_id, created, updated, deleted, skipped = plan.skipped, "Reconciling provider events");

        let outcome = self.apply(plan, progress).await;
        progress(SyncProgress::complete(outcome.changes_made(), None));
        outcome
    }

    /// Run deletes, then updates, then inserts. A failed item never stops
    /// the rest of its batch.
    pub async fn apply(&self, plan: SyncPlan, progress: Progress<'_>) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        self.apply_deletes(&plan, &mut outcome, progress).await;
        self.apply_updates(&plan, &mut outcome, progress).await;
        self.apply_inserts(plan, &mut outcome, progress).await;
        outcome
    }

    async fn apply_deletes(
        &self,
        plan: &SyncPlan,
        outcome: &mut ReconcileOutcome,
        progress: Progress<'_>,
    ) {
        let total = plan.deletes.len();
        let mut current = 0;

        for batch in plan.deletes.chunks(DELETE_BATCH_SIZE) {
            let ids: Vec<String> = batch.iter().map(|d| d.event_id.clone()).collect();

            match self.store.delete_many(&ids).await {
                Ok(()) => outcome.deleted += ids.len(),
                Err(e) => {
                    tracing::warn!(error = %e, count = ids.len(), "Batch delete failed, deleting one by one");
                    for id in &ids {
                        match self.store.delete(id).await {
                            Ok(()) => outcome.deleted += 1,
                            Err(e) => {
                                tracing::error!(id, error = %e, "Failed to delete event");
                                outcome.failed += 1;
                            }
                        }
                    }
                }
            }

            current += batch.len();
            progress(
                SyncProgress::new(SyncPhase::Delete, current, total)
                    .with_changes(outcome.changes_made()),
            );
        }
    }

    async fn apply_updates(
        &self,
        plan: &SyncPlan,
        outcome: &mut ReconcileOutcome,
        progress: Progress<'_>,
    ) {
        let total = plan.updates.len();
        let mut current = 0;

        for batch in plan.updates.chunks(UPDATE_BATCH_SIZE) {
            for planned in batch {
                match self
                    .retry
                    .update(self.store, &planned.event_id, &planned.update)
                    .await
                {
                    Ok(_) => match planned.kind {
                        UpdateKind::Content => outcome.updated += 1,
                        UpdateKind::AdoptProviderId => outcome.adopted += 1,
                    },
                    Err(e) => {
                        tracing::error!(id = %planned.event_id, error = %e, "Failed to update event");
                        outcome.failed += 1;
                    }
                }
            }

            current += batch.len();
            progress(
                SyncProgress::new(SyncPhase::Update, current, total)
                    .with_changes(outcome.changes_made()),
            );
        }
    }

    async fn apply_inserts(
        &self,
        plan: SyncPlan,
        outcome: &mut ReconcileOutcome,
        progress: Progress<'_>,
    ) {
        let total = plan.inserts.len();
        let mut current = 0;

        for batch in plan.inserts.chunks(INSERT_BATCH_SIZE) {
            match self.store.insert_many(batch).await {
                Ok(rows) => outcome.inserted += rows.len(),
                Err(e) => {
                    tracing::warn!(error = %e, count = batch.len(), "Batch insert failed, inserting one by one");
                    for event in batch {
                        match self.store.insert(event).await {
                            Ok(_) => outcome.inserted += 1,
                            Err(e) => {
                                tracing::error!(title = %event.title, error = %e, "Failed to insert event");
                                outcome.failed += 1;
                            }
                        }
                    }
                }
            }

            current += batch.len();
            progress(
                SyncProgress::new(SyncPhase::Insert, current, total)
                    .with_changes(outcome.changes_made()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::color::SupportedColor;
    use crate::provider::ProviderTime;
    use crate::store::{EventQuery, MemoryStore};
    use crate::sync::ignore_progress;
    use chrono::{Duration, TimeZone, Utc};

    fn provider_event(n: usize) -> ProviderEvent {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(n as i64);
        ProviderEvent {
            id: format!("g{n}"),
            summary: Some(format!("Event {n}")),
            start: ProviderTime::date_time(start.to_rfc3339()),
            end: ProviderTime::date_time((start + Duration::minutes(30)).to_rfc3339()),
            ..Default::default()
        }
    }

    async fn mirror(store: &MemoryStore) -> Vec<CalendarEvent> {
        store.list(&EventQuery::workspace("ws")).await.unwrap()
    }

    #[tokio::test]
    async fn test_second_run_writes_nothing() {
        let store = MemoryStore::new();
        let provider_events: Vec<_> = (0..3).map(provider_event).collect();
        let reconciler = Reconciler::new(&store);

        let first = reconciler
            .reconcile("ws", &provider_events, &mirror(&store).await, None, &ignore_progress)
            .await;
        assert_eq!(first.inserted, 3);
        assert!(first.changes_made());

        let writes = store.writes();
        let second = reconciler
            .reconcile("ws", &provider_events, &mirror(&store).await, None, &ignore_progress)
            .await;
        assert!(!second.changes_made());
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn test_progress_is_reported_per_batch() {
        let store = MemoryStore::new();
        let provider_events: Vec<_> = (0..23).map(provider_event).collect();
        let reports = Mutex::new(Vec::new());
        let record = |p: SyncProgress| reports.lock().unwrap().push(p);

        Reconciler::new(&store)
            .reconcile("ws", &provider_events, &[], None, &record)
            .await;

        let reports = reports.into_inner().unwrap();
        let inserts: Vec<_> = reports
            .iter()
            .filter(|p| p.phase == SyncPhase::Insert)
            .map(|p| (p.current, p.total))
            .collect();
        assert_eq!(inserts, vec![(10, 23), (20, 23), (23, 23)]);

        let last = reports.last().unwrap();
        assert_eq!(last.phase, SyncPhase::Complete);
        assert!(last.changes_made);
    }

    #[tokio::test]
    async fn test_batch_failures_fall_back_to_single_items() {
        let store = MemoryStore::new();
        for n in 0..2 {
            store
                .insert(&provider_event(n).to_new_event("ws", None).unwrap())
                .await
                .unwrap();
        }
        store.fail_batch_deletes(true);
        store.fail_batch_inserts(true);

        let outcome = Reconciler::new(&store)
            .reconcile("ws", &[provider_event(5)], &mirror(&store).await, None, &ignore_progress)
            .await;

        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(mirror(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_update_does_not_abort_the_rest() {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for n in 0..2 {
            let row = store
                .insert(&provider_event(n).to_new_event("ws", None).unwrap())
                .await
                .unwrap();
            ids.push(row.id);
        }
        store.fail_updates(&ids[0], 5);

        let mut changed: Vec<_> = (0..2).map(provider_event).collect();
        for event in &mut changed {
            event.summary = Some("Renamed".into());
        }

        let outcome = Reconciler::new(&store)
            .reconcile("ws", &changed, &mirror(&store).await, None, &ignore_progress)
            .await;

        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(store.event(&ids[1]).unwrap().title, "Renamed");
    }

    #[tokio::test]
    async fn test_adoption_links_local_event() {
        let store = MemoryStore::new();
        let incoming = provider_event(1);
        let mut local = incoming.to_new_event("ws", None).unwrap();
        local.google_event_id = None;
        local.color = SupportedColor::Red;
        let row = store.insert(&local).await.unwrap();

        let outcome = Reconciler::new(&store)
            .reconcile("ws", &[incoming], &mirror(&store).await, None, &ignore_progress)
            .await;

        assert_eq!(outcome.adopted, 1);
        assert_eq!(outcome.inserted, 0);
        let stored = store.event(&row.id).unwrap();
        assert_eq!(stored.google_event_id.as_deref(), Some("g1"));
        assert_eq!(stored.color, SupportedColor::Red);
    }

    #[test]
    fn test_outcome_without_writes_has_no_changes() {
        let outcome = ReconcileOutcome {
            failed: 3,
            ..Default::default()
        };
        assert!(!outcome.changes_made());
    }
}
