//! Classification of provider events against the local mirror.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::event::{CalendarEvent, EventPatch, NewEvent, StoreUpdate};
use crate::provider::ProviderEvent;
use crate::signature::EventSignature;
use crate::sync::DiffKind;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDelete {
    pub event_id: String,
    pub google_event_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Provider content changed; carries only the changed fields.
    Content,
    /// Link an unmirrored local event to the provider; content untouched.
    AdoptProviderId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub event_id: String,
    pub title: String,
    pub kind: UpdateKind,
    pub update: StoreUpdate,
}

/// One line of a plan, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub kind: DiffKind,
    pub title: String,
    pub start_at: Option<DateTime<Utc>>,
}

/// Writes needed to bring the local mirror in line with the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    pub deletes: Vec<PlannedDelete>,
    pub updates: Vec<PlannedUpdate>,
    pub inserts: Vec<NewEvent>,
    /// Provider events that could not be interpreted.
    pub skipped: usize,
}

impl SyncPlan {
    /// Classify every provider event.
    ///
    /// `local_events` is the local mirror of the workspace within the fetched
    /// window. Mirrored events match by provider id; unmirrored ones are only
    /// candidates for adoption by signature.
    pub fn build(
        ws_id: &str,
        provider_events: &[ProviderEvent],
        local_events: &[CalendarEvent],
        tz: Option<&str>,
    ) -> Self {
        let mut plan = SyncPlan::default();

        let mut seen = HashSet::new();
        let provider_events: Vec<&ProviderEvent> = provider_events
            .iter()
            .filter(|e| !e.id.is_empty() && !e.is_cancelled())
            .filter(|e| seen.insert(e.id.as_str()))
            .collect();

        let mut mirrored: HashMap<&str, &CalendarEvent> = HashMap::new();
        let mut unmirrored: Vec<&CalendarEvent> = Vec::new();
        for event in local_events.iter().filter(|e| e.ws_id == ws_id) {
            match event.google_event_id.as_deref().filter(|id| !id.is_empty()) {
                Some(gid) => {
                    mirrored.entry(gid).or_insert(event);
                }
                None => unmirrored.push(event),
            }
        }

        for (gid, local) in &mirrored {
            if !seen.contains(gid) {
                plan.deletes.push(PlannedDelete {
                    event_id: local.id.clone(),
                    google_event_id: gid.to_string(),
                    title: local.title.clone(),
                });
            }
        }
        plan.deletes.sort_by(|a, b| a.event_id.cmp(&b.event_id));

        let mut adopted: HashSet<&str> = HashSet::new();
        for provider_event in provider_events {
            let incoming = match provider_event.to_new_event(ws_id, tz) {
                Ok(event) if event.end_at > event.start_at => event,
                Ok(_) => {
                    tracing::warn!(id = %provider_event.id, "Skipping provider event that ends before it starts");
                    plan.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(id = %provider_event.id, error = %e, "Skipping provider event with unreadable times");
                    plan.skipped += 1;
                    continue;
                }
            };

            if let Some(local) = mirrored.get(provider_event.id.as_str()) {
                let patch = changed_fields(local, &incoming);
                if !patch.is_empty() {
                    plan.updates.push(PlannedUpdate {
                        event_id: local.id.clone(),
                        title: incoming.title.clone(),
                        kind: UpdateKind::Content,
                        update: patch.into(),
                    });
                }
                continue;
            }

            let signature = EventSignature::from(&incoming);
            let candidate = unmirrored
                .iter()
                .find(|e| !adopted.contains(e.id.as_str()) && EventSignature::from(**e) == signature);

            match candidate {
                Some(local) => {
                    adopted.insert(local.id.as_str());
                    plan.updates.push(PlannedUpdate {
                        event_id: local.id.clone(),
                        title: local.title.clone(),
                        kind: UpdateKind::AdoptProviderId,
                        update: StoreUpdate::adopt_provider_id(&provider_event.id),
                    });
                }
                None => plan.inserts.push(incoming),
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.updates.is_empty() && self.inserts.is_empty()
    }

    /// (created, updated, deleted); adoptions count as updates.
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.inserts.len(), self.updates.len(), self.deletes.len())
    }

    pub fn changes(&self) -> Vec<PlannedChange> {
        let deletes = self.deletes.iter().map(|d| PlannedChange {
            kind: DiffKind::Delete,
            title: d.title.clone(),
            start_at: None,
        });
        let updates = self.updates.iter().map(|u| PlannedChange {
            kind: match u.kind {
                UpdateKind::Content => DiffKind::Update,
                UpdateKind::AdoptProviderId => DiffKind::Adopt,
            },
            title: u.title.clone(),
            start_at: u.update.patch.start_at,
        });
        let inserts = self.inserts.iter().map(|e| PlannedChange {
            kind: DiffKind::Create,
            title: e.title.clone(),
            start_at: Some(e.start_at),
        });

        deletes.chain(updates).chain(inserts).collect()
    }
}

/// Fields of `incoming` that differ from `local`.
fn changed_fields(local: &CalendarEvent, incoming: &NewEvent) -> EventPatch {
    fn differs<T: PartialEq + Clone>(local: &T, incoming: &T) -> Option<T> {
        (local != incoming).then(|| incoming.clone())
    }

    EventPatch {
        title: differs(&local.title, &incoming.title),
        description: differs(&local.description, &incoming.description),
        location: differs(&local.location, &incoming.location),
        start_at: differs(&local.start_at, &incoming.start_at),
        end_at: differs(&local.end_at, &incoming.end_at),
        color: differs(&local.color, &incoming.color),
        locked: None,
    }
}
