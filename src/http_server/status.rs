//! Represents the `/status` endpoint handler and response structure.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;

use super::{ApiError, ApiState};
use crate::wearable::RateLimitStatus;

/// Represents the response from the `/status` endpoint.
#[derive(Debug, Serialize, Clone)]
pub struct StatusResponse {
    /// The version of the application.
    pub version: String,
    /// The uptime of the application in seconds.
    pub uptime_secs: u64,
    /// Patients with at least one tracked active alert.
    pub patients_with_active_alerts: usize,
    /// Wearable API quota usage.
    pub rate_limit: RateLimitStatus,
}

/// Retrieves application status and rate-limit usage.
pub async fn status(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let response = StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.app_metrics.uptime_secs(),
        patients_with_active_alerts: state.services.tracker.tracked_patients(),
        rate_limit: state.services.rate_limiter.status(),
    };
    Ok((StatusCode::OK, Json(response)))
}
