//! Implementation of the `CareRepository` trait for `SqliteCareRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    models::{
        Alert, CheckIn, CheckInStatus, DeviceToken, HeartRateReading, NotificationPreferences,
        ReadingSource, RefreshedTokens, WearableConnection,
    },
    persistence::{
        error::PersistenceError,
        sqlite::SqliteCareRepository,
        traits::{AlertFilter, CareRepository},
    },
};

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct AlertRow {
    alert_id: i64,
    patient_id: i64,
    created_by: i64,
    name: String,
    metric_type: String,
    metric_path: String,
    operator: String,
    threshold_value: String,
    priority: String,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = PersistenceError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let malformed = |e: crate::models::alert::ParseAlertFieldError| {
            PersistenceError::MalformedRow(format!("alert {}: {e}", row.alert_id))
        };
        Ok(Alert {
            id: row.alert_id,
            patient_id: row.patient_id,
            created_by: row.created_by,
            metric_type: row.metric_type.parse().map_err(malformed)?,
            operator: row.operator.parse().map_err(malformed)?,
            priority: row.priority.parse().map_err(malformed)?,
            name: row.name,
            metric_path: row.metric_path,
            threshold_value: row.threshold_value,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct CheckInRow {
    check_in_id: i64,
    patient_id: i64,
    medication_id: Option<i64>,
    status: String,
    taken_at: Option<DateTime<Utc>>,
}

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct ReadingRow {
    reading_id: i64,
    patient_id: i64,
    heart_rate: i64,
    source: String,
    timestamp: DateTime<Utc>,
}

impl TryFrom<ReadingRow> for HeartRateReading {
    type Error = PersistenceError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        Ok(HeartRateReading {
            id: row.reading_id,
            patient_id: row.patient_id,
            heart_rate: row.heart_rate,
            source: row
                .source
                .parse()
                .map_err(|e| PersistenceError::MalformedRow(format!("reading {}: {e}", row.reading_id)))?,
            timestamp: row.timestamp,
        })
    }
}

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct PreferencesRow {
    alerts_enabled: bool,
    high_priority_enabled: bool,
    mid_priority_enabled: bool,
    low_priority_enabled: bool,
}

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct ConnectionRow {
    patient_id: i64,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    token_type: Option<String>,
    scope: Option<String>,
}

const ALERT_COLUMNS: &str = "alert_id, patient_id, created_by, name, metric_type, metric_path, \
                             operator, threshold_value, priority, enabled, created_at, updated_at";

#[async_trait]
impl CareRepository for SqliteCareRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_enabled_alerts(&self, filter: AlertFilter) -> Result<Vec<Alert>, PersistenceError> {
        let sql = format!(
            "SELECT {ALERT_COLUMNS} FROM alerts WHERE enabled = TRUE \
             AND (?1 IS NULL OR patient_id = ?1) AND (?2 IS NULL OR priority = ?2) \
             ORDER BY patient_id, alert_id"
        );
        let rows: Vec<AlertRow> = self
            .execute_query_with_error_handling(
                "list enabled alerts",
                sqlx::query_as(&sql)
                    .bind(filter.patient_id)
                    .bind(filter.priority.map(|p| p.as_str()))
                    .fetch_all(&self.pool),
            )
            .await?;

        tracing::debug!(count = rows.len(), "Enabled alerts loaded.");
        rows.into_iter().map(Alert::try_from).collect()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_alert_by_id(&self, alert_id: i64) -> Result<Option<Alert>, PersistenceError> {
        let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE alert_id = ?");
        let row: Option<AlertRow> = self
            .execute_query_with_error_handling(
                "get alert by id",
                sqlx::query_as(&sql).bind(alert_id).fetch_optional(&self.pool),
            )
            .await?;
        row.map(Alert::try_from).transpose()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_recent_check_ins(
        &self,
        patient_id: i64,
        status: CheckInStatus,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>, PersistenceError> {
        let rows: Vec<CheckInRow> = self
            .execute_query_with_error_handling(
                "list recent check-ins",
                sqlx::query_as(
                    "SELECT check_in_id, patient_id, medication_id, status, taken_at \
                     FROM medication_check_ins \
                     WHERE patient_id = ? AND status = ? AND taken_at IS NOT NULL \
                     AND julianday(taken_at) >= julianday(?) \
                     ORDER BY julianday(taken_at) DESC",
                )
                .bind(patient_id)
                .bind(status.as_str())
                .bind(since)
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| CheckIn {
                id: row.check_in_id,
                patient_id: row.patient_id,
                medication_id: row.medication_id,
                status,
                taken_at: row.taken_at,
            })
            .collect())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_latest_heart_rate_reading(
        &self,
        patient_id: i64,
    ) -> Result<Option<HeartRateReading>, PersistenceError> {
        let row: Option<ReadingRow> = self
            .execute_query_with_error_handling(
                "get latest heart rate reading",
                sqlx::query_as(
                    "SELECT reading_id, patient_id, heart_rate, source, timestamp \
                     FROM heart_rate_readings WHERE patient_id = ? \
                     ORDER BY julianday(timestamp) DESC, reading_id DESC LIMIT 1",
                )
                .bind(patient_id)
                .fetch_optional(&self.pool),
            )
            .await?;
        row.map(HeartRateReading::try_from).transpose()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn insert_heart_rate_reading(
        &self,
        patient_id: i64,
        heart_rate: i64,
        source: ReadingSource,
        timestamp: DateTime<Utc>,
    ) -> Result<HeartRateReading, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "insert heart rate reading",
                sqlx::query(
                    "INSERT INTO heart_rate_readings (patient_id, heart_rate, source, timestamp) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(patient_id)
                .bind(heart_rate)
                .bind(source.as_str())
                .bind(timestamp)
                .execute(&self.pool),
            )
            .await?;

        Ok(HeartRateReading {
            id: result.last_insert_rowid(),
            patient_id,
            heart_rate,
            source,
            timestamp,
        })
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_patient_users(&self, patient_id: i64) -> Result<Vec<i64>, PersistenceError> {
        let rows: Vec<(i64,)> = self
            .execute_query_with_error_handling(
                "get patient users",
                sqlx::query_as("SELECT user_id FROM patient_users WHERE patient_id = ? ORDER BY user_id")
                    .bind(patient_id)
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows.into_iter().map(|(user_id,)| user_id).collect())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_notification_preferences(
        &self,
        user_id: i64,
    ) -> Result<NotificationPreferences, PersistenceError> {
        let row: Option<PreferencesRow> = self
            .execute_query_with_error_handling(
                "get notification preferences",
                sqlx::query_as(
                    "SELECT alerts_enabled, high_priority_enabled, mid_priority_enabled, \
                     low_priority_enabled FROM notification_preferences WHERE user_id = ?",
                )
                .bind(user_id)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row
            .map(|row| NotificationPreferences {
                alerts_enabled: row.alerts_enabled,
                high_priority_enabled: row.high_priority_enabled,
                mid_priority_enabled: row.mid_priority_enabled,
                low_priority_enabled: row.low_priority_enabled,
            })
            .unwrap_or_default())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_device_tokens(&self, user_id: i64) -> Result<Vec<DeviceToken>, PersistenceError> {
        let rows: Vec<(i64, String, Option<String>)> = self
            .execute_query_with_error_handling(
                "get device tokens",
                sqlx::query_as(
                    "SELECT user_id, token, platform FROM device_tokens WHERE user_id = ? ORDER BY token_id",
                )
                .bind(user_id)
                .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|(user_id, token, platform)| DeviceToken { user_id, token, platform })
            .collect())
    }

    #[tracing::instrument(skip(self, token), level = "debug")]
    async fn delete_device_token(&self, token: &str) -> Result<bool, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "delete device token",
                sqlx::query("DELETE FROM device_tokens WHERE token = ?")
                    .bind(token)
                    .execute(&self.pool),
            )
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!("Invalid device token removed.");
        }
        Ok(deleted)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_wearable_connection(
        &self,
        patient_id: i64,
    ) -> Result<Option<WearableConnection>, PersistenceError> {
        let row: Option<ConnectionRow> = self
            .execute_query_with_error_handling(
                "get wearable connection",
                sqlx::query_as(
                    "SELECT patient_id, access_token, refresh_token, expires_at, token_type, scope \
                     FROM wearable_connections WHERE patient_id = ?",
                )
                .bind(patient_id)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(|row| WearableConnection {
            patient_id: row.patient_id,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            expires_at: row.expires_at,
            token_type: row.token_type,
            scope: row.scope,
        }))
    }

    #[tracing::instrument(skip(self, tokens), level = "debug")]
    async fn update_wearable_tokens(
        &self,
        patient_id: i64,
        tokens: &RefreshedTokens,
    ) -> Result<(), PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "update wearable tokens",
                sqlx::query(
                    "UPDATE wearable_connections SET access_token = ?, \
                     refresh_token = COALESCE(?, refresh_token), expires_at = ?, updated_at = ? \
                     WHERE patient_id = ?",
                )
                .bind(&tokens.access_token)
                .bind(&tokens.refresh_token)
                .bind(tokens.expires_at)
                .bind(Utc::now())
                .bind(patient_id)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!(
                "wearable connection for patient {patient_id}"
            )));
        }
        tracing::debug!(patient_id, "Wearable tokens updated.");
        Ok(())
    }
}
