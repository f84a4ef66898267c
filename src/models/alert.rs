//! This module defines the `Alert` structure, a caregiver-defined threshold
//! rule on a single metric of a single patient.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a stored enum column holds an unknown value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown {kind} value: '{value}'")]
pub struct ParseAlertFieldError {
    kind: &'static str,
    value: String,
}

impl ParseAlertFieldError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// The data family a metric path is resolved against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Physiological data from the wearable vendor (and local readings).
    Whoop,
    /// Medication adherence derived from check-ins.
    Medication,
}

impl MetricType {
    /// The stored textual form.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Whoop => "whoop",
            MetricType::Medication => "medication",
        }
    }
}

impl FromStr for MetricType {
    type Err = ParseAlertFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whoop" => Ok(MetricType::Whoop),
            "medication" => Ok(MetricType::Medication),
            other => Err(ParseAlertFieldError::new("metric type", other)),
        }
    }
}

/// Comparison applied between the resolved metric and the threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    /// `value < threshold`
    #[serde(rename = "<")]
    LessThan,
    /// `value > threshold`
    #[serde(rename = ">")]
    GreaterThan,
    /// `|value - threshold| < 0.0001`
    #[serde(rename = "=")]
    Equal,
    /// `value <= threshold`
    #[serde(rename = "<=")]
    LessThanOrEqual,
    /// `value >= threshold`
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
}

impl ComparisonOperator {
    /// The stored textual form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::Equal => "=",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::GreaterThanOrEqual => ">=",
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = ParseAlertFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(ComparisonOperator::LessThan),
            ">" => Ok(ComparisonOperator::GreaterThan),
            "=" => Ok(ComparisonOperator::Equal),
            "<=" => Ok(ComparisonOperator::LessThanOrEqual),
            ">=" => Ok(ComparisonOperator::GreaterThanOrEqual),
            other => Err(ParseAlertFieldError::new("operator", other)),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority tier of an alert. Each tier has its own re-evaluation cadence
/// and its own per-user notification preference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    /// Re-evaluated every 30 seconds by default.
    High,
    /// Re-evaluated every 5 minutes by default.
    Mid,
    /// Re-evaluated once a day at local midnight.
    Low,
}

impl AlertPriority {
    /// All tiers, in scheduling order.
    pub const ALL: [AlertPriority; 3] = [AlertPriority::High, AlertPriority::Mid, AlertPriority::Low];

    /// The stored textual form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPriority::High => "high",
            AlertPriority::Mid => "mid",
            AlertPriority::Low => "low",
        }
    }
}

impl FromStr for AlertPriority {
    type Err = ParseAlertFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(AlertPriority::High),
            "mid" => Ok(AlertPriority::Mid),
            "low" => Ok(AlertPriority::Low),
            other => Err(ParseAlertFieldError::new("priority", other)),
        }
    }
}

impl fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caregiver-defined threshold rule.
///
/// The threshold is kept as the exact string the user entered and is only
/// parsed when the alert is evaluated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique identifier, assigned by the store.
    pub id: i64,
    /// The patient whose data this alert watches.
    pub patient_id: i64,
    /// The user that created the alert.
    pub created_by: i64,
    /// Display name, used in notification titles.
    pub name: String,
    /// Data family the metric path refers to.
    pub metric_type: MetricType,
    /// Dotted path identifying the metric.
    pub metric_path: String,
    /// Comparison operator.
    pub operator: ComparisonOperator,
    /// Threshold exactly as entered.
    pub threshold_value: String,
    /// Priority tier.
    pub priority: AlertPriority,
    /// Disabled alerts are never evaluated.
    pub enabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// The fields needed to create an alert; the store assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
    /// The patient whose data this alert watches.
    pub patient_id: i64,
    /// The user creating the alert.
    pub created_by: i64,
    /// Display name.
    pub name: String,
    /// Data family.
    pub metric_type: MetricType,
    /// Dotted metric path.
    pub metric_path: String,
    /// Comparison operator.
    pub operator: ComparisonOperator,
    /// Threshold as entered.
    pub threshold_value: String,
    /// Priority tier.
    pub priority: AlertPriority,
    /// Whether the alert starts enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}
