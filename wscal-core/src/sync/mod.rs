//! Reconciliation of provider events with the local mirror.

mod diff_kind;
mod engine;
mod plan;
mod progress;
mod retry;

pub use diff_kind::DiffKind;
pub use engine::{ReconcileOutcome, Reconciler};
pub use plan::{PlannedChange, PlannedDelete, PlannedUpdate, SyncPlan, UpdateKind};
pub use progress::{Progress, SyncPhase, SyncProgress, ignore_progress};
pub use retry::RetryPolicy;
