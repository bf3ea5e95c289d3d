use std::sync::Arc;

use anyhow::Result;
use wscal_core::{CalendarContext, HttpProvider, RestStore, WscalConfig};

use crate::utils::tui;

/// Build a calendar context for the configured workspace and load its events.
pub async fn open() -> Result<(WscalConfig, CalendarContext)> {
    let config = WscalConfig::load()?;
    let ws_id = config.workspace_id()?.to_string();
    let timeout = config.request_timeout()?;

    let store = RestStore::new(&config.store_url, config.api_key.as_deref(), timeout)?;
    let provider = HttpProvider::new(&config.api_url, config.api_key.as_deref(), timeout)?;

    let spinner = tui::create_spinner("Loading events...".to_string());
    let context = CalendarContext::builder(ws_id, Arc::new(store))
        .provider(Arc::new(provider))
        .settings(config.settings()?)
        .build()
        .await;
    spinner.finish_and_clear();

    Ok((config, context?))
}
