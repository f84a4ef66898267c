//! Defines the custom `ApiError` type for the HTTP server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::{
    engine::AlertManagerError, live::LiveReadingError, persistence::error::PersistenceError,
};

/// A custom error type for the API that can be converted into an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    /// Represents an unauthorized request.
    Unauthorized,

    /// Represents a malformed request.
    BadRequest(String),

    /// Represents a resource that could not be found.
    NotFound(String),

    /// Represents a generic internal server error.
    InternalServerError(String),
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(what) => ApiError::NotFound(format!("Not found: {what}")),
            _ => ApiError::InternalServerError(err.to_string()),
        }
    }
}

impl From<AlertManagerError> for ApiError {
    fn from(err: AlertManagerError) -> Self {
        ApiError::InternalServerError(err.to_string())
    }
}

impl From<LiveReadingError> for ApiError {
    fn from(err: LiveReadingError) -> Self {
        match err {
            LiveReadingError::InvalidHeartRate(_) | LiveReadingError::InvalidSource(_) =>
                ApiError::BadRequest(err.to_string()),
            LiveReadingError::Persistence(e) => e.into(),
        }
    }
}

/// Implements the conversion from `ApiError` into an `axum` response.
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::Unauthorized =>
                (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" })),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::InternalServerError(err) => {
                tracing::error!("Internal server error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An internal server error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn status_and_body(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_rows_map_to_not_found() {
        let error: ApiError = PersistenceError::NotFound("patient 42".into()).into();
        let (status, body) = status_and_body(error).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Not found: patient 42" }));
    }

    #[tokio::test]
    async fn test_storage_failures_hide_details() {
        let error: ApiError = PersistenceError::OperationFailed("disk I/O error".into()).into();
        let (status, body) = status_and_body(error).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "An internal server error occurred" }));
    }

    #[tokio::test]
    async fn test_invalid_reading_maps_to_bad_request() {
        let error: ApiError = LiveReadingError::InvalidSource("manual".into()).into();
        let (status, body) = status_and_body(error).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid source 'manual'. Must be 'bluetooth' or 'api'" }));
    }
}
