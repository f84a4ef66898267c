//! Threshold evaluation of alerts.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use thiserror::Error;

use super::metric_resolver::MetricSource;
use crate::{
    models::{ActiveAlertRecord, Alert, AlertPriority, ComparisonOperator},
    persistence::{AlertFilter, CareRepository, error::PersistenceError},
};

/// Tolerance used by the `=` operator.
pub const EQUALITY_EPSILON: f64 = 0.0001;

/// Errors that prevent a patient's alerts from being evaluated at all.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// The patient's alerts could not be loaded.
    #[error("Failed to load alerts: {0}")]
    LoadAlerts(#[from] PersistenceError),
}

/// Compares a metric value against a threshold entered as text.
///
/// Returns `false` whenever the value or the threshold is absent, NaN or
/// infinite.
pub fn compare_values(value: Option<f64>, operator: ComparisonOperator, threshold: &str) -> bool {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return false;
    };
    let Some(threshold) = threshold.trim().parse::<f64>().ok().filter(|t| t.is_finite()) else {
        return false;
    };

    match operator {
        ComparisonOperator::LessThan => value < threshold,
        ComparisonOperator::GreaterThan => value > threshold,
        ComparisonOperator::Equal => (value - threshold).abs() < EQUALITY_EPSILON,
        ComparisonOperator::LessThanOrEqual => value <= threshold,
        ComparisonOperator::GreaterThanOrEqual => value >= threshold,
    }
}

/// Result of evaluating every enabled alert of a patient.
#[derive(Debug, Clone, Default)]
pub struct PatientEvaluation {
    /// Priority of every enabled alert that was evaluated, by alert id.
    pub enabled: HashMap<i64, AlertPriority>,
    /// Records of the alerts that are currently active.
    pub active: Vec<ActiveAlertRecord>,
}

impl PatientEvaluation {
    /// Ids of every evaluated alert.
    pub fn enabled_ids(&self) -> HashSet<i64> {
        self.enabled.keys().copied().collect()
    }

    /// Ids of the evaluated alerts in `priority`'s tier.
    pub fn tier_ids(&self, priority: AlertPriority) -> HashSet<i64> {
        self.enabled.iter().filter(|(_, p)| **p == priority).map(|(id, _)| *id).collect()
    }

    /// Ids of the active alerts.
    pub fn active_ids(&self) -> HashSet<i64> {
        self.active.iter().map(|record| record.alert.id).collect()
    }
}

/// Evaluates alerts against their resolved metrics.
pub struct AlertEvaluator {
    repository: Arc<dyn CareRepository>,
    metrics: Arc<dyn MetricSource>,
}

impl AlertEvaluator {
    /// Creates an evaluator.
    pub fn new(repository: Arc<dyn CareRepository>, metrics: Arc<dyn MetricSource>) -> Self {
        Self { repository, metrics }
    }

    /// Evaluates a single alert for `patient_id`.
    pub async fn evaluate(&self, alert: &Alert, patient_id: i64) -> ActiveAlertRecord {
        evaluate_with(self.metrics.as_ref(), alert, patient_id).await
    }

    /// Evaluates every enabled alert of the patient concurrently and returns
    /// the active ones.
    pub async fn evaluate_all(&self, patient_id: i64) -> Result<Vec<ActiveAlertRecord>, EvaluatorError> {
        Ok(self.evaluate_patient(patient_id).await?.active)
    }

    /// Like [`evaluate_all`](Self::evaluate_all), also reporting which alerts
    /// were enabled.
    pub async fn evaluate_patient(&self, patient_id: i64) -> Result<PatientEvaluation, EvaluatorError> {
        let alerts = self.repository.list_enabled_alerts(AlertFilter::for_patient(patient_id)).await?;
        let enabled = alerts.iter().map(|alert| (alert.id, alert.priority)).collect();

        let handles: Vec<_> = alerts
            .iter()
            .cloned()
            .map(|alert| {
                let metrics = Arc::clone(&self.metrics);
                tokio::spawn(async move { evaluate_with(metrics.as_ref(), &alert, patient_id).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        let active = alerts
            .into_iter()
            .zip(results)
            .map(|(alert, result)| match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(alert_id = alert.id, patient_id, error = %e, "Alert evaluation failed.");
                    ActiveAlertRecord::inactive(alert, format!("Evaluation failed: {e}"))
                }
            })
            .filter(|record| record.is_active)
            .collect();

        Ok(PatientEvaluation { enabled, active })
    }
}

async fn evaluate_with(metrics: &dyn MetricSource, alert: &Alert, patient_id: i64) -> ActiveAlertRecord {
    let resolution = metrics.resolve(alert, patient_id).await;
    let value = resolution.value.filter(|v| v.is_finite());
    let is_active = compare_values(value, alert.operator, &alert.threshold_value);

    if value.is_some() && alert.threshold_value.trim().parse::<f64>().is_err() {
        tracing::warn!(alert_id = alert.id, threshold = %alert.threshold_value, "Alert threshold is not numeric.");
    }

    ActiveAlertRecord {
        alert: alert.clone(),
        current_value: value.unwrap_or(0.0),
        is_active,
        triggered_at: None,
        metric_error: resolution.error,
    }
}
