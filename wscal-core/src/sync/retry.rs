//! Read-modify-write retry for a single store update.

use crate::constants::UPDATE_MAX_RETRIES;
use crate::error::{CalendarError, CalendarResult};
use crate::event::{CalendarEvent, StoreUpdate};
use crate::store::EventStore;

/// Bounded read-modify-write retry for store updates.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: UPDATE_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Update `id`, and on failure re-read the row and write again against
    /// the id it reports. A row that already reflects the update is returned
    /// without another write.
    pub async fn update(
        &self,
        store: &dyn EventStore,
        id: &str,
        update: &StoreUpdate,
    ) -> CalendarResult<CalendarEvent> {
        let mut last_error = match store.update(id, update).await {
            Ok(row) => return Ok(row),
            Err(e) => e,
        };

        for attempt in 1..=self.max_retries {
            tracing::warn!(id, attempt, error = %last_error, "Update failed, retrying");

            let current = store
                .get(id)
                .await?
                .ok_or_else(|| CalendarError::EventNotFound(id.to_string()))?;

            let mut expected = current.clone();
            update.apply_to(&mut expected);
            if expected == current {
                return Ok(current);
            }

            match store.update(&current.id, update).await {
                Ok(row) => return Ok(row),
                Err(e) => last_error = e,
            }
        }

        Err(last_error)
    }
}
