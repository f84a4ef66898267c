//! Handler for live heart-rate readings.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use super::{ApiError, ApiState};

/// Body of `POST /patients/{id}/heart-rate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRatePayload {
    /// Beats per minute.
    pub heart_rate: i64,
    /// `bluetooth` or `api`.
    pub source: String,
}

/// Stores the reading and re-evaluates the patient's alerts.
pub async fn post_heart_rate(
    State(state): State<ApiState>,
    Path(patient_id): Path<i64>,
    Json(payload): Json<HeartRatePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let recorded =
        state.services.live.record(patient_id, payload.heart_rate, &payload.source).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "heartRate": recorded.reading.heart_rate,
            "timestamp": recorded.reading.timestamp.timestamp_millis(),
            "newlyTriggered": recorded.newly_triggered,
        })),
    ))
}
