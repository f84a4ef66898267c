//! Error types for the wearable vendor integration.

use std::time::Duration;

use thiserror::Error;

use crate::persistence::error::PersistenceError;

/// Errors raised while obtaining a valid vendor access token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The patient never linked a wearable account.
    #[error("No wearable connection found for patient {0}")]
    ConnectionNotFound(i64),

    /// The stored token expired and there is no refresh token to renew it.
    #[error("Wearable access token for patient {0} expired and cannot be refreshed")]
    MissingRefreshToken(i64),

    /// The OAuth endpoint rejected or failed the refresh.
    #[error("Wearable token refresh failed: {0}")]
    RefreshFailed(String),

    /// Reading or writing the stored connection failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Errors raised by the wearable gateway and HTTP client.
#[derive(Debug, Error)]
pub enum WearableError {
    /// The patient has no wearable connection.
    #[error("No wearable connection found for patient {0}")]
    ConnectionNotFound(i64),

    /// The local quota manager refused the call.
    #[error("{reason}")]
    QuotaExceeded {
        /// Human-readable explanation of the binding limit.
        reason: String,
        /// Estimated time until the limit clears.
        wait: Option<Duration>,
    },

    /// The vendor answered `429 Too Many Requests`.
    #[error("Rate limit exceeded (429): {body}. Wait {}", describe_wait(.retry_after))]
    RateLimited {
        /// Parsed `Retry-After`, if present.
        retry_after: Option<Duration>,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The vendor answered with another non-success status.
    #[error("Failed to fetch wearable data ({path}): {status} - {body}")]
    Status {
        /// Endpoint path that failed.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("Wearable request failed: {0}")]
    Transport(String),

    /// The configured API base URL is unusable.
    #[error("Invalid wearable API URL: {0}")]
    InvalidUrl(String),

    /// Token acquisition failed for a reason other than a missing connection.
    #[error(transparent)]
    Token(TokenError),
}

impl From<TokenError> for WearableError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::ConnectionNotFound(patient_id) => WearableError::ConnectionNotFound(patient_id),
            other => WearableError::Token(other),
        }
    }
}

fn describe_wait(wait: &Option<Duration>) -> String {
    match wait {
        Some(wait) => format!("{} seconds", wait.as_secs()),
        None => "before retrying".to_string(),
    }
}
