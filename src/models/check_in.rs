//! Medication check-ins.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alert::ParseAlertFieldError;

/// Outcome recorded for a scheduled medication dose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckInStatus {
    /// The dose was taken.
    Taken,
    /// The dose was missed.
    Missed,
    /// The dose was deliberately skipped.
    Skipped,
}

impl CheckInStatus {
    /// The stored textual form.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckInStatus::Taken => "taken",
            CheckInStatus::Missed => "missed",
            CheckInStatus::Skipped => "skipped",
        }
    }
}

impl FromStr for CheckInStatus {
    type Err = ParseAlertFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "taken" => Ok(CheckInStatus::Taken),
            "missed" => Ok(CheckInStatus::Missed),
            "skipped" => Ok(CheckInStatus::Skipped),
            other => Err(ParseAlertFieldError::new("check-in status", other)),
        }
    }
}

/// A single medication check-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    /// Unique identifier.
    pub id: i64,
    /// The patient the dose belongs to.
    pub patient_id: i64,
    /// The medication, when known.
    pub medication_id: Option<i64>,
    /// Recorded outcome.
    pub status: CheckInStatus,
    /// When the check-in was recorded.
    pub taken_at: Option<DateTime<Utc>>,
}
