//! Locally stored heart-rate readings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alert::ParseAlertFieldError;

/// Upper bound accepted for a heart-rate reading, in bpm.
pub const MAX_HEART_RATE_BPM: i64 = 300;

/// Where a reading came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReadingSource {
    /// Streamed from a paired device over Bluetooth.
    Bluetooth,
    /// Fetched from the wearable vendor API.
    Api,
}

impl ReadingSource {
    /// The stored textual form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingSource::Bluetooth => "bluetooth",
            ReadingSource::Api => "api",
        }
    }
}

impl FromStr for ReadingSource {
    type Err = ParseAlertFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bluetooth" => Ok(ReadingSource::Bluetooth),
            "api" => Ok(ReadingSource::Api),
            other => Err(ParseAlertFieldError::new("reading source", other)),
        }
    }
}

/// A single heart-rate sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateReading {
    /// Unique identifier.
    pub id: i64,
    /// The patient the reading belongs to.
    pub patient_id: i64,
    /// Beats per minute.
    pub heart_rate: i64,
    /// Origin of the reading.
    pub source: ReadingSource,
    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
}

impl HeartRateReading {
    /// Whether `bpm` lies in the accepted `(0, 300]` range.
    pub fn is_valid_bpm(bpm: i64) -> bool {
        bpm > 0 && bpm <= MAX_HEART_RATE_BPM
    }
}
