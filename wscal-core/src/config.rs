//! Global wscal configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarSettings;
use crate::color::SupportedColor;
use crate::constants::{DEFAULT_DEBOUNCE_MS, DEFAULT_DRAIN_DELAY_MS, DEFAULT_EVENT_MINUTES};
use crate::error::{CalendarError, CalendarResult};
use crate::queue::QueueConfig;
use crate::time::{AUTO_TIMEZONE, resolve_timezone};

static DEFAULT_API_URL: &str = "http://localhost:7803";
static DEFAULT_STORE_URL: &str = "http://localhost:54321/rest/v1";
static DEFAULT_REQUEST_TIMEOUT: &str = "10s";

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

fn default_store_url() -> String {
    DEFAULT_STORE_URL.into()
}

fn default_timezone() -> String {
    AUTO_TIMEZONE.into()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_drain_delay_ms() -> u64 {
    DEFAULT_DRAIN_DELAY_MS
}

fn default_event_minutes() -> i64 {
    DEFAULT_EVENT_MINUTES
}

fn default_request_timeout() -> String {
    DEFAULT_REQUEST_TIMEOUT.into()
}

/// Configuration at ~/.config/wscal/config.toml
///
/// Every key can be overridden with a `WSCAL_`-prefixed environment
/// variable, e.g. `WSCAL_WORKSPACE_ID`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WscalConfig {
    /// Base URL of the app API serving the provider endpoints.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// REST endpoint of the relational store.
    #[serde(default = "default_store_url")]
    pub store_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_drain_delay_ms")]
    pub drain_delay_ms: u64,

    #[serde(default = "default_event_minutes")]
    pub default_event_minutes: i64,

    #[serde(default)]
    pub default_color: SupportedColor,

    /// Humantime duration, e.g. "10s" or "1m 30s".
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
}

impl Default for WscalConfig {
    fn default() -> Self {
        WscalConfig {
            api_url: default_api_url(),
            store_url: default_store_url(),
            api_key: None,
            workspace_id: None,
            timezone: default_timezone(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            drain_delay_ms: DEFAULT_DRAIN_DELAY_MS,
            default_event_minutes: DEFAULT_EVENT_MINUTES,
            default_color: SupportedColor::default(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl WscalConfig {
    pub fn config_path() -> CalendarResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalendarError::Config("Could not determine config directory".into()))?
            .join("wscal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the global config, writing a commented default file on first run.
    pub fn load() -> CalendarResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load from `path` (which may be missing) plus the environment.
    pub fn load_from(path: &Path) -> CalendarResult<Self> {
        let config: WscalConfig = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix("WSCAL"))
            .build()
            .map_err(|e| CalendarError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalendarError::Config(e.to_string()))?;

        config.request_timeout()?;
        Ok(config)
    }

    /// Save the current config to ~/.config/wscal/config.toml
    pub fn save(&self) -> CalendarResult<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> CalendarResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| CalendarError::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> CalendarResult<()> {
        let contents = format!(
            "\
# wscal configuration

# App API serving the calendar provider endpoints:
# api_url = \"{DEFAULT_API_URL}\"

# REST endpoint of the event store, and its key:
# store_url = \"{DEFAULT_STORE_URL}\"
# api_key = \"...\"

# Workspace to operate on:
# workspace_id = \"...\"

# IANA zone for day boundaries, or \"auto\" for the system zone:
# timezone = \"{AUTO_TIMEZONE}\"

# Quiet period before queued edits are written, and pause between writes:
# debounce_ms = {DEFAULT_DEBOUNCE_MS}
# drain_delay_ms = {DEFAULT_DRAIN_DELAY_MS}

# New events:
# default_event_minutes = {DEFAULT_EVENT_MINUTES}
# default_color = \"BLUE\"

# HTTP request timeout:
# request_timeout = \"{DEFAULT_REQUEST_TIMEOUT}\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;

        Ok(())
    }

    pub fn request_timeout(&self) -> CalendarResult<Duration> {
        humantime::parse_duration(&self.request_timeout).map_err(|e| {
            CalendarError::Config(format!("Invalid request_timeout '{}': {e}", self.request_timeout))
        })
    }

    /// The configured workspace, or an error telling the user to set one.
    pub fn workspace_id(&self) -> CalendarResult<&str> {
        self.workspace_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                CalendarError::Config(
                    "No workspace configured. Set workspace_id in the config file or WSCAL_WORKSPACE_ID."
                        .into(),
                )
            })
    }

    pub fn settings(&self) -> CalendarResult<CalendarSettings> {
        if self.default_event_minutes <= 0 {
            return Err(CalendarError::Config(
                "default_event_minutes must be positive".into(),
            ));
        }

        Ok(CalendarSettings {
            timezone: resolve_timezone(&self.timezone)?,
            default_event_minutes: self.default_event_minutes,
            default_color: self.default_color,
            queue: QueueConfig {
                debounce: Duration::from_millis(self.debounce_ms),
                drain_delay: Duration::from_millis(self.drain_delay_ms),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;

    #[test]
    fn test_default_config_file_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wscal").join("config.toml");

        WscalConfig::create_default_config(&path).unwrap();
        let config = WscalConfig::load_from(&path).unwrap();

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timezone, AUTO_TIMEZONE);
        assert_eq!(config.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert_eq!(config.request_timeout().unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "workspace_id = \"ws-1\"\ntimezone = \"Asia/Tokyo\"\ndebounce_ms = 500\ndefault_color = \"RED\"\n",
        )
        .unwrap();

        let config = WscalConfig::load_from(&path).unwrap();
        let settings = config.settings().unwrap();

        assert_eq!(config.workspace_id().unwrap(), "ws-1");
        assert_eq!(settings.timezone, Tz::Asia__Tokyo);
        assert_eq!(settings.queue.debounce, Duration::from_millis(500));
        assert_eq!(settings.default_color, SupportedColor::Red);
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "request_timeout = \"soon\"\n").unwrap();

        assert!(matches!(
            WscalConfig::load_from(&path),
            Err(CalendarError::Config(_))
        ));
    }

    #[test]
    fn test_save_round_trips_set_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = WscalConfig {
            workspace_id: Some("ws-2".into()),
            default_event_minutes: 30,
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        let loaded = WscalConfig::load_from(&path).unwrap();

        assert_eq!(loaded.workspace_id.as_deref(), Some("ws-2"));
        assert_eq!(loaded.default_event_minutes, 30);
    }

    #[test]
    fn test_unwritable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("wscal");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = WscalConfig::create_default_config(&blocker.join("config.toml"));
        assert!(matches!(result, Err(CalendarError::Io(_))));

        let result = WscalConfig::default().save_to(&blocker.join("config.toml"));
        assert!(matches!(result, Err(CalendarError::Io(_))));
    }

    #[test]
    fn test_missing_workspace_is_a_config_error() {
        let config = WscalConfig::default();
        assert!(matches!(config.workspace_id(), Err(CalendarError::Config(_))));
    }
}
