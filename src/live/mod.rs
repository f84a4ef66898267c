//! Ingestion of live heart-rate readings.
//!
//! A reading is validated, stored, written into the wearable heart-rate
//! cache and broadcast to subscribers before the patient's alerts are
//! re-evaluated out of cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::{
    engine::{AlertManager, PassScope},
    models::{HeartRateReading, MAX_HEART_RATE_BPM, ReadingSource},
    persistence::{CareRepository, error::PersistenceError},
    wearable::WearableGateway,
};

/// Errors rejecting or failing to store a live reading.
#[derive(Debug, Error)]
pub enum LiveReadingError {
    /// Heart rate outside `(0, 300]`.
    #[error("Invalid heart rate value {0}, must be between 1 and {max}", max = MAX_HEART_RATE_BPM)]
    InvalidHeartRate(i64),

    /// Unknown reading source.
    #[error("Invalid source '{0}'. Must be 'bluetooth' or 'api'")]
    InvalidSource(String),

    /// The reading could not be stored.
    #[error("Failed to store reading: {0}")]
    Persistence(#[from] PersistenceError),
}

/// A reading as pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveReading {
    /// The patient the reading belongs to.
    pub patient_id: i64,
    /// Beats per minute.
    pub heart_rate: i64,
    /// When the reading was stored.
    pub timestamp: DateTime<Utc>,
}

/// Result of recording a reading.
#[derive(Debug, Clone)]
pub struct RecordedReading {
    /// The stored reading.
    pub reading: HeartRateReading,
    /// Alerts that became active because of this reading.
    pub newly_triggered: Vec<i64>,
}

/// Accepts live readings and fans them out.
pub struct LiveReadingHandler {
    repository: Arc<dyn CareRepository>,
    gateway: Arc<WearableGateway>,
    manager: Arc<AlertManager>,
    sender: broadcast::Sender<LiveReading>,
}

impl LiveReadingHandler {
    /// Creates a handler whose broadcast channel keeps up to
    /// `channel_capacity` readings for slow subscribers.
    pub fn new(
        repository: Arc<dyn CareRepository>,
        gateway: Arc<WearableGateway>,
        manager: Arc<AlertManager>,
        channel_capacity: usize,
    ) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self { repository, gateway, manager, sender }
    }

    /// Subscribes to readings recorded from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LiveReading> {
        self.sender.subscribe()
    }

    /// Records a reading for `patient_id` and runs an out-of-cycle
    /// evaluation of every enabled alert of the patient.
    ///
    /// A failing evaluation is logged; the reading stays recorded.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn record(
        &self,
        patient_id: i64,
        heart_rate: i64,
        source: &str,
    ) -> Result<RecordedReading, LiveReadingError> {
        if !HeartRateReading::is_valid_bpm(heart_rate) {
            return Err(LiveReadingError::InvalidHeartRate(heart_rate));
        }
        let source: ReadingSource =
            source.parse().map_err(|_| LiveReadingError::InvalidSource(source.to_string()))?;

        let reading = self
            .repository
            .insert_heart_rate_reading(patient_id, heart_rate, source, Utc::now())
            .await?;
        self.gateway.cache_heart_rate(patient_id, heart_rate as f64);

        // No subscribers is not an error.
        let _ = self.sender.send(LiveReading {
            patient_id,
            heart_rate,
            timestamp: reading.timestamp,
        });

        let newly_triggered = match self.manager.process_patient(patient_id, PassScope::AllTiers).await {
            Ok(triggered) => triggered,
            Err(e) => {
                tracing::error!(patient_id, error = %e, "Out-of-cycle evaluation failed.");
                Vec::new()
            }
        };

        Ok(RecordedReading { reading, newly_triggered })
    }
}
