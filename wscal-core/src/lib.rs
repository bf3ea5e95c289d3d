//! Core of the wscal workspace calendar.
//!
//! This crate provides everything a front end needs to show and edit the
//! events of one workspace:
//! - `CalendarContext`, the operation surface over a local event mirror
//! - `UpdateQueue`, which debounces and serializes edits of existing events
//! - `sync`, which reconciles a provider calendar into the event store
//! - `EventStore` and `CalendarProvider`, with REST/HTTP and in-memory backends

pub mod calendar;
pub mod color;
pub mod config;
pub mod constants;
pub mod date_range;
pub mod error;
pub mod event;
pub mod provider;
pub mod queue;
pub mod signature;
pub mod store;
pub mod sync;
pub mod time;

pub use calendar::{CalendarContext, CalendarContextBuilder, CalendarSettings, DeleteReport, SyncSummary};
pub use color::SupportedColor;
pub use config::WscalConfig;
pub use date_range::DateRange;
pub use error::{CalendarError, CalendarResult};
pub use event::{CalendarEvent, EventPatch, NewEvent, StoreUpdate};
pub use provider::{CalendarProvider, HttpProvider, MemoryProvider, ProviderDeleteOutcome, ProviderEvent};
pub use queue::{QueueConfig, UpdateApplier, UpdateHandle, UpdateQueue};
pub use store::{EventQuery, EventStore, MemoryStore, RestStore};
