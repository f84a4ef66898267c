use std::time::Duration;

use serde::Deserialize;

use super::deserialize_duration_from_seconds;

fn default_high_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_mid_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

/// Cadence of the periodic priority tiers.
///
/// The low tier has no interval: it always fires at the next local midnight.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Re-evaluation interval for `high` priority alerts.
    #[serde(
        default = "default_high_interval",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub high_interval_secs: Duration,

    /// Re-evaluation interval for `mid` priority alerts.
    #[serde(
        default = "default_mid_interval",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub mid_interval_secs: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { high_interval_secs: default_high_interval(), mid_interval_secs: default_mid_interval() }
    }
}
