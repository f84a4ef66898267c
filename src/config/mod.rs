//! Configuration module for Carewatch.

mod app_config;
mod helpers;
mod http_base;
mod http_retry;
mod notifications;
mod scheduler;
mod server;
mod wearable;

pub use app_config::AppConfig;
pub use helpers::{
    deserialize_duration_from_ms, deserialize_duration_from_seconds, serialize_duration_to_ms,
    serialize_duration_to_seconds,
};
pub use http_base::BaseHttpClientConfig;
pub use http_retry::{HttpRetryConfig, JitterSetting};
pub use notifications::{NotificationConfig, PriorityLabels};
pub use scheduler::SchedulerConfig;
pub use server::ServerConfig;
pub use wearable::WearableConfig;
