//! The derived result of evaluating one alert.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::alert::Alert;

/// Output of one evaluation of one alert. Never persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAlertRecord {
    /// The alert definition that was evaluated.
    pub alert: Alert,
    /// The resolved metric, or `0.0` when it could not be resolved.
    pub current_value: f64,
    /// Whether the threshold comparison held.
    pub is_active: bool,
    /// When the alert was first tracked as active, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
    /// Why the metric could not be resolved, when it could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_error: Option<String>,
}

impl ActiveAlertRecord {
    /// An inactive, zero-valued record used when evaluation failed outright.
    pub fn inactive(alert: Alert, reason: impl Into<String>) -> Self {
        Self {
            alert,
            current_value: 0.0,
            is_active: false,
            triggered_at: None,
            metric_error: Some(reason.into()),
        }
    }
}
