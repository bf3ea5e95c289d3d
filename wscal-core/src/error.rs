//! Error types for the wscal workspace calendar.

use thiserror::Error;

/// Errors that can occur in calendar operations.
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Event {event_id} does not belong to workspace {ws_id}")]
    WrongWorkspace { event_id: String, ws_id: String },

    #[error("Event {0} is locked")]
    Locked(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Calendar provider needs re-authentication")]
    ProviderNeedsReauth,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Update cancelled: calendar context was shut down")]
    Cancelled,

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl CalendarError {
    /// Produce an equivalent error for another waiter of the same write.
    ///
    /// Transport errors are not `Clone`, so they are carried over as their message.
    pub fn replicate(&self) -> CalendarError {
        match self {
            CalendarError::Validation(m) => CalendarError::Validation(m.clone()),
            CalendarError::EventNotFound(id) => CalendarError::EventNotFound(id.clone()),
            CalendarError::WrongWorkspace { event_id, ws_id } => CalendarError::WrongWorkspace {
                event_id: event_id.clone(),
                ws_id: ws_id.clone(),
            },
            CalendarError::Locked(id) => CalendarError::Locked(id.clone()),
            CalendarError::Provider(m) => CalendarError::Provider(m.clone()),
            CalendarError::ProviderNeedsReauth => CalendarError::ProviderNeedsReauth,
            CalendarError::Config(m) => CalendarError::Config(m.clone()),
            CalendarError::Cancelled => CalendarError::Cancelled,
            CalendarError::NotSupported(m) => CalendarError::NotSupported(m.clone()),
            other => CalendarError::Store(other.to_string()),
        }
    }
}

/// Result type alias for calendar operations.
pub type CalendarResult<T> = Result<T, CalendarError>;
