use thiserror::Error;

use crate::{
    http_client::HttpClientPoolError, notification::NotificationError,
    persistence::error::PersistenceError, wearable::WearableError,
};

/// Errors that can occur during application context initialization.
#[derive(Debug, Error)]
pub enum AppContextError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Persistence error.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// An outbound HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] HttpClientPoolError),

    /// The wearable API client could not be configured.
    #[error("Wearable client error: {0}")]
    Wearable(#[from] WearableError),

    /// The notification dispatcher could not be configured.
    #[error("Notification service error: {0}")]
    Notification(#[from] NotificationError),
}
