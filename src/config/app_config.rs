use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{
    BaseHttpClientConfig, NotificationConfig, SchedulerConfig, ServerConfig, WearableConfig,
    deserialize_duration_from_seconds,
};

/// Provides the default value for shutdown_timeout.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default value for live_channel_capacity.
fn default_live_channel_capacity() -> usize {
    256
}

/// Application configuration for Carewatch.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite database.
    pub database_url: String,

    /// The maximum time in seconds to wait for graceful shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_shutdown_timeout"
    )]
    pub shutdown_timeout: Duration,

    /// Priority tier cadence.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Wearable vendor API and quota settings.
    #[serde(default)]
    pub wearable: WearableConfig,

    /// Notification dispatch settings.
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Connection settings for outbound HTTP clients.
    #[serde(default)]
    pub http_base_config: BaseHttpClientConfig,

    /// Capacity of the live heart-rate broadcast channel.
    #[serde(default = "default_live_channel_capacity")]
    pub live_channel_capacity: usize,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            shutdown_timeout: default_shutdown_timeout(),
            scheduler: SchedulerConfig::default(),
            wearable: WearableConfig::default(),
            notifications: NotificationConfig::default(),
            http_base_config: BaseHttpClientConfig::default(),
            live_channel_capacity: default_live_channel_capacity(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading `app.yaml` from the configuration
    /// directory, with `CAREWATCH__*` environment variables taking precedence.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("CAREWATCH").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
