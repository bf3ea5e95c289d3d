//! Progress reporting for sync operations.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    /// Reading local events (quick sync).
    Get,
    Fetch,
    Delete,
    Update,
    Insert,
    /// Writing provider events keyed by provider id (quick sync).
    Upsert,
    Complete,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Get => "get",
            SyncPhase::Fetch => "fetch",
            SyncPhase::Delete => "delete",
            SyncPhase::Update => "update",
            SyncPhase::Insert => "insert",
            SyncPhase::Upsert => "upsert",
            SyncPhase::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub current: usize,
    pub total: usize,
    pub changes_made: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl SyncProgress {
    pub fn new(phase: SyncPhase, current: usize, total: usize) -> Self {
        SyncProgress {
            phase,
            current,
            total,
            changes_made: false,
            status_message: None,
        }
    }

    pub fn complete(changes_made: bool, status_message: Option<String>) -> Self {
        SyncProgress {
            phase: SyncPhase::Complete,
            current: 0,
            total: 0,
            changes_made,
            status_message,
        }
    }

    pub fn with_changes(mut self, changes_made: bool) -> Self {
        self.changes_made = changes_made;
        self
    }
}

/// Caller-supplied progress callback.
pub type Progress<'a> = &'a (dyn Fn(SyncProgress) + Send + Sync);

/// Progress callback that discards every report.
pub fn ignore_progress(_: SyncProgress) {}
