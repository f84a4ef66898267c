//! Handler for a patient's currently active alerts.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use super::{ApiError, ApiState};

/// Evaluates the patient's enabled alerts now and returns the active ones.
pub async fn get_active_alerts(
    State(state): State<ApiState>,
    Path(patient_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let alerts = state.services.manager.active_alerts(patient_id).await?;
    Ok((StatusCode::OK, Json(json!({ "alerts": alerts }))))
}
