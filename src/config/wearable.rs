use std::time::Duration;

use serde::Deserialize;

use super::{HttpRetryConfig, deserialize_duration_from_ms, deserialize_duration_from_seconds};

fn default_api_base_url() -> String {
    "https://api.prod.whoop.com/developer/v2/".to_string()
}

fn default_token_url() -> String {
    "https://api.prod.whoop.com/oauth/oauth2/token".to_string()
}

fn default_requests_per_minute() -> u32 {
    100
}

fn default_requests_per_day() -> u32 {
    10_000
}

fn default_heart_rate_cache_ttl() -> Duration {
    Duration::from_secs(15)
}

fn default_metric_cache_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_lookback() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_recent_reading_max_age() -> Duration {
    Duration::from_secs(5 * 60)
}

/// Settings for the third-party wearable API, its OAuth refresh endpoint and
/// the local quota manager that guards it.
#[derive(Debug, Deserialize, Clone)]
pub struct WearableConfig {
    /// Base URL the data endpoints (`cycle`, `recovery`, ...) are joined to.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// OAuth token endpoint used for refreshing expired access tokens.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth client id.
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: String,

    /// Local ceiling on vendor calls in any trailing 60 seconds.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Local ceiling on vendor calls per calendar day (reset at local midnight).
    #[serde(default = "default_requests_per_day")]
    pub requests_per_day: u32,

    /// How long a cached heart-rate sample stays fresh.
    #[serde(
        default = "default_heart_rate_cache_ttl",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub heart_rate_cache_ttl_ms: Duration,

    /// How long cached cycles/recovery/sleep/workout payloads stay fresh.
    #[serde(default = "default_metric_cache_ttl", deserialize_with = "deserialize_duration_from_ms")]
    pub metric_cache_ttl_ms: Duration,

    /// Size of the `[now - lookback, now]` window requested from the vendor.
    #[serde(default = "default_lookback", deserialize_with = "deserialize_duration_from_seconds")]
    pub lookback_secs: Duration,

    /// Maximum age of a stored heart-rate reading for it to count as current.
    #[serde(
        default = "default_recent_reading_max_age",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub recent_reading_max_age_secs: Duration,

    /// Retry policy for vendor HTTP calls.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}

impl Default for WearableConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token_url: default_token_url(),
            client_id: String::new(),
            client_secret: String::new(),
            requests_per_minute: default_requests_per_minute(),
            requests_per_day: default_requests_per_day(),
            heart_rate_cache_ttl_ms: default_heart_rate_cache_ttl(),
            metric_cache_ttl_ms: default_metric_cache_ttl(),
            lookback_secs: default_lookback(),
            recent_reading_max_age_secs: default_recent_reading_max_age(),
            retry_policy: HttpRetryConfig::default(),
        }
    }
}
