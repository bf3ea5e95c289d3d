use anyhow::Result;
use owo_colors::OwoColorize;
use wscal_core::WscalConfig;

pub fn run() -> Result<()> {
    let config_path = WscalConfig::config_path()?;
    let config = WscalConfig::load()?;
    let settings = config.settings()?;

    println!("{}", "Paths".bold());
    println!("  Config:     {}", config_path.display());

    println!("\n{}", "Endpoints".bold());
    println!("  API:        {}", config.api_url);
    println!("  Store:      {}", config.store_url);
    println!(
        "  API key:    {}",
        if config.api_key.is_some() { "set" } else { "not set" }
    );

    println!("\n{}", "Calendar".bold());
    println!(
        "  Workspace:  {}",
        config.workspace_id.as_deref().unwrap_or("(not set)")
    );
    println!("  Timezone:   {} ({})", settings.timezone_name(), config.timezone.dimmed());
    println!("  New events: {} min, {}", settings.default_event_minutes, settings.default_color);
    println!(
        "  Edits:      written after {} ms idle, {} ms apart",
        config.debounce_ms, config.drain_delay_ms
    );

    Ok(())
}
