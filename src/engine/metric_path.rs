//! Typed metric paths.
//!
//! Alert definitions name their metric with a dotted string. The string is
//! parsed once into a [`MetricPath`] that says which data source to consult,
//! and, for vendor payloads, which [`FieldPath`] to walk inside a record.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::models::MetricType;

/// Reasons a metric path cannot be resolved at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetricPathError {
    /// Medication alerts only know `missed_dose`.
    #[error("Unknown medication metric: {0}")]
    UnknownMedicationMetric(String),

    /// The path is empty or has an empty segment.
    #[error("Invalid metric path: '{0}'")]
    Invalid(String),
}

/// A dotted sequence of object field names, walked case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses `a.b.c`. Empty segments are rejected.
    pub fn parse(raw: &str) -> Result<Self, MetricPathError> {
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(MetricPathError::Invalid(raw.to_string()));
        }
        Ok(Self { segments })
    }

    /// The segments of the path.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Walks `root` and returns the numeric value at the end of the path.
    ///
    /// An array met before a segment is replaced by its first element. The
    /// terminal value must be a finite number or a string that parses as one.
    pub fn resolve(&self, root: &Value) -> Option<f64> {
        let mut current = root;
        for segment in &self.segments {
            if let Value::Array(items) = current {
                current = items.first()?;
            }
            current = current.as_object()?.get(segment)?;
        }
        numeric(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Coerces a terminal JSON value into a finite number.
pub fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Where an alert's metric comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricPath {
    /// Number of missed medication check-ins in the lookback window.
    MissedDoses,
    /// Current heart rate, from cache, local readings or vendor data.
    HeartRate,
    /// A field of the patient's latest recovery, relative to the recovery
    /// object.
    Recovery(FieldPath),
    /// A field of the latest sleep record. `full` keeps the original
    /// `sleep.` prefix and is tried when the relative path misses.
    Sleep {
        /// Path with the `sleep.` prefix removed.
        relative: FieldPath,
        /// Path exactly as written.
        full: FieldPath,
    },
    /// A field of the latest cycle, falling back to the latest recovery.
    Cycle(FieldPath),
}

impl MetricPath {
    /// Interprets `raw` for an alert of `metric_type`.
    pub fn parse(metric_type: MetricType, raw: &str) -> Result<Self, MetricPathError> {
        match metric_type {
            MetricType::Medication => match raw {
                "missed_dose" => Ok(MetricPath::MissedDoses),
                other => Err(MetricPathError::UnknownMedicationMetric(other.to_string())),
            },
            MetricType::Whoop => {
                let lowered = raw.to_ascii_lowercase();
                if lowered == "heart_rate" || lowered == "heartrate" {
                    Ok(MetricPath::HeartRate)
                } else if lowered.starts_with("recovery") {
                    let relative = raw.strip_prefix("recovery.").unwrap_or(raw);
                    Ok(MetricPath::Recovery(FieldPath::parse(relative)?))
                } else if lowered.starts_with("sleep") {
                    let relative = raw.strip_prefix("sleep.").unwrap_or(raw);
                    Ok(MetricPath::Sleep {
                        relative: FieldPath::parse(relative)?,
                        full: FieldPath::parse(raw)?,
                    })
                } else {
                    Ok(MetricPath::Cycle(FieldPath::parse(raw)?))
                }
            }
        }
    }
}
