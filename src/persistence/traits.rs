//! The storage interface consumed by the alerting core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::{
    models::{
        Alert, AlertPriority, CheckIn, CheckInStatus, DeviceToken, HeartRateReading,
        NotificationPreferences, ReadingSource, RefreshedTokens, WearableConnection,
    },
    persistence::error::PersistenceError,
};

/// Optional narrowing applied when listing enabled alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertFilter {
    /// Only alerts for this patient.
    pub patient_id: Option<i64>,
    /// Only alerts of this priority tier.
    pub priority: Option<AlertPriority>,
}

impl AlertFilter {
    /// All enabled alerts of one patient.
    pub fn for_patient(patient_id: i64) -> Self {
        Self { patient_id: Some(patient_id), priority: None }
    }

    /// All enabled alerts of one tier, across patients.
    pub fn for_priority(priority: AlertPriority) -> Self {
        Self { patient_id: None, priority: Some(priority) }
    }
}

/// Read and write access to the care data the alerting core depends on.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CareRepository: Send + Sync {
    /// Lists enabled alerts, optionally narrowed by patient and/or priority.
    async fn list_enabled_alerts(&self, filter: AlertFilter) -> Result<Vec<Alert>, PersistenceError>;

    /// Fetches a single alert regardless of its enabled flag.
    async fn get_alert_by_id(&self, alert_id: i64) -> Result<Option<Alert>, PersistenceError>;

    /// Lists a patient's check-ins with `status` taken at or after `since`.
    async fn list_recent_check_ins(
        &self,
        patient_id: i64,
        status: CheckInStatus,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>, PersistenceError>;

    /// The most recent stored heart-rate reading for a patient.
    async fn get_latest_heart_rate_reading(
        &self,
        patient_id: i64,
    ) -> Result<Option<HeartRateReading>, PersistenceError>;

    /// Stores a heart-rate reading and returns it with its assigned id.
    async fn insert_heart_rate_reading(
        &self,
        patient_id: i64,
        heart_rate: i64,
        source: ReadingSource,
        timestamp: DateTime<Utc>,
    ) -> Result<HeartRateReading, PersistenceError>;

    /// User ids linked to a patient (caregivers and the patient account).
    async fn get_patient_users(&self, patient_id: i64) -> Result<Vec<i64>, PersistenceError>;

    /// A user's notification preferences, or the all-enabled defaults.
    async fn get_notification_preferences(
        &self,
        user_id: i64,
    ) -> Result<NotificationPreferences, PersistenceError>;

    /// Registered push tokens of a user.
    async fn get_device_tokens(&self, user_id: i64) -> Result<Vec<DeviceToken>, PersistenceError>;

    /// Removes a push token. Returns whether a row was deleted.
    async fn delete_device_token(&self, token: &str) -> Result<bool, PersistenceError>;

    /// The stored wearable OAuth connection for a patient.
    async fn get_wearable_connection(
        &self,
        patient_id: i64,
    ) -> Result<Option<WearableConnection>, PersistenceError>;

    /// Persists tokens obtained from a refresh.
    async fn update_wearable_tokens(
        &self,
        patient_id: i64,
        tokens: &RefreshedTokens,
    ) -> Result<(), PersistenceError>;
}
