//! Error types for the notification dispatcher and push transport.

use thiserror::Error;

use crate::{
    http_client::HttpClientPoolError, notification::template::TemplateServiceError,
    persistence::error::PersistenceError,
};

/// Defines the possible errors that can occur while dispatching alerts.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// An error related to invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error indicating that the notification failed to be sent.
    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    /// An internal error that should not occur under normal circumstances.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// An error originating from the HTTP client pool.
    #[error("HTTP client error")]
    HttpClientError(#[from] HttpClientPoolError),

    /// An error from the underlying `reqwest` or `reqwest_middleware`
    /// libraries.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest_middleware::Error),

    /// An error related to the template rendering process.
    #[error("Template rendering error: {0}")]
    TemplateError(#[from] TemplateServiceError),

    /// Recipients, preferences or tokens could not be loaded.
    #[error("Storage error: {0}")]
    Persistence(#[from] PersistenceError),
}
