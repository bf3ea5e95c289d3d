//! Shared constants.

/// Sentinel id of the client-side draft that has not been persisted yet.
pub const NEW_EVENT_ID: &str = "new";

/// Remote table holding workspace calendar events.
pub const EVENTS_TABLE: &str = "workspace_calendar_events";

/// Event start/end times are snapped to this many minutes.
pub const ROUNDING_MINUTES: i64 = 15;

pub const DEFAULT_DEBOUNCE_MS: u64 = 250;
pub const DEFAULT_DRAIN_DELAY_MS: u64 = 50;
pub const DEFAULT_EVENT_MINUTES: i64 = 60;

pub const DELETE_BATCH_SIZE: usize = 10;
pub const UPDATE_BATCH_SIZE: usize = 5;
pub const INSERT_BATCH_SIZE: usize = 10;

/// Retries after a failed reconciliation update (read-modify-write).
pub const UPDATE_MAX_RETRIES: u32 = 1;
