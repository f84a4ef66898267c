//! This module provides a concrete implementation of the `CareRepository`
//! using SQLite.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub mod care_repository;

use crate::{
    models::{CheckInStatus, NewAlert, NotificationPreferences, WearableConnection},
    persistence::error::PersistenceError,
};

/// A concrete implementation of the `CareRepository` using SQLite.
pub struct SqliteCareRepository {
    /// The SQLite connection pool used for database operations.
    pool: SqlitePool,
}

impl SqliteCareRepository {
    /// Creates a new instance of SqliteCareRepository with the provided
    /// database URL. This will create the database file if it does not
    /// exist.
    #[tracing::instrument(level = "info")]
    pub async fn new(database_url: &str) -> Result<Self, PersistenceError> {
        tracing::debug!(database_url, "Attempting to connect to SQLite database.");
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PersistenceError::InvalidInput(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);
        // An in-memory database lives only as long as its connection.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                PersistenceError::OperationFailed(format!("Failed to connect to database: {}", e))
            })?;
        tracing::info!(database_url, "Successfully connected to SQLite database.");
        Ok(Self { pool })
    }

    /// Runs database migrations.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_migrations(&self) -> Result<(), PersistenceError> {
        tracing::debug!("Running database migrations.");
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run database migrations.");
            PersistenceError::MigrationError(e.to_string())
        })?;
        tracing::info!("Database migrations completed successfully.");
        Ok(())
    }

    /// Flushes the WAL into the main database file.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "WAL checkpoint",
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)").execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    /// Closes the connection pool gracefully.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn close(&self) {
        tracing::debug!("Closing SQLite connection pool.");
        self.pool.close().await;
        tracing::info!("SQLite connection pool closed successfully.");
    }

    /// Creates a patient record and returns its id.
    pub async fn create_patient(&self, name: &str) -> Result<i64, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "create patient",
                sqlx::query("INSERT INTO patients (name, created_at) VALUES (?, ?)")
                    .bind(name)
                    .bind(Utc::now())
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Links a user account to a patient. `role` is `patient` or `caregiver`.
    pub async fn add_patient_user(
        &self,
        patient_id: i64,
        user_id: i64,
        role: &str,
    ) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "add patient user",
            sqlx::query(
                "INSERT OR IGNORE INTO patient_users (patient_id, user_id, role) VALUES (?, ?, ?)",
            )
            .bind(patient_id)
            .bind(user_id)
            .bind(role)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    /// Stores a new alert and returns its id.
    pub async fn create_alert(&self, alert: &NewAlert) -> Result<i64, PersistenceError> {
        let now = Utc::now();
        let result = self
            .execute_query_with_error_handling(
                "create alert",
                sqlx::query(
                    "INSERT INTO alerts (patient_id, created_by, name, metric_type, metric_path, \
                     operator, threshold_value, priority, enabled, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(alert.patient_id)
                .bind(alert.created_by)
                .bind(&alert.name)
                .bind(alert.metric_type.as_str())
                .bind(&alert.metric_path)
                .bind(alert.operator.as_str())
                .bind(&alert.threshold_value)
                .bind(alert.priority.as_str())
                .bind(alert.enabled)
                .bind(now)
                .bind(now)
                .execute(&self.pool),
            )
            .await?;
        tracing::debug!(alert_id = result.last_insert_rowid(), "Alert created.");
        Ok(result.last_insert_rowid())
    }

    /// Enables or disables an alert.
    pub async fn set_alert_enabled(&self, alert_id: i64, enabled: bool) -> Result<(), PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "set alert enabled",
                sqlx::query("UPDATE alerts SET enabled = ?, updated_at = ? WHERE alert_id = ?")
                    .bind(enabled)
                    .bind(Utc::now())
                    .bind(alert_id)
                    .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("alert {alert_id}")));
        }
        Ok(())
    }

    /// Records a medication check-in.
    pub async fn add_check_in(
        &self,
        patient_id: i64,
        medication_id: Option<i64>,
        status: CheckInStatus,
        taken_at: DateTime<Utc>,
    ) -> Result<i64, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "add check-in",
                sqlx::query(
                    "INSERT INTO medication_check_ins (patient_id, medication_id, status, taken_at) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(patient_id)
                .bind(medication_id)
                .bind(status.as_str())
                .bind(taken_at)
                .execute(&self.pool),
            )
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Registers a push token for a user. Re-registering moves the token.
    pub async fn add_device_token(
        &self,
        user_id: i64,
        token: &str,
        platform: Option<&str>,
    ) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "add device token",
            sqlx::query(
                "INSERT INTO device_tokens (user_id, token, platform, created_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT(token) DO UPDATE SET user_id = excluded.user_id, platform = excluded.platform",
            )
            .bind(user_id)
            .bind(token)
            .bind(platform)
            .bind(Utc::now())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    /// Stores a user's notification preferences.
    pub async fn set_notification_preferences(
        &self,
        user_id: i64,
        prefs: &NotificationPreferences,
    ) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "set notification preferences",
            sqlx::query(
                "INSERT OR REPLACE INTO notification_preferences \
                 (user_id, alerts_enabled, high_priority_enabled, mid_priority_enabled, low_priority_enabled) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(prefs.alerts_enabled)
            .bind(prefs.high_priority_enabled)
            .bind(prefs.mid_priority_enabled)
            .bind(prefs.low_priority_enabled)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    /// Creates or replaces a patient's wearable connection.
    pub async fn upsert_wearable_connection(
        &self,
        connection: &WearableConnection,
    ) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "upsert wearable connection",
            sqlx::query(
                "INSERT OR REPLACE INTO wearable_connections \
                 (patient_id, access_token, refresh_token, expires_at, token_type, scope, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(connection.patient_id)
            .bind(&connection.access_token)
            .bind(&connection.refresh_token)
            .bind(connection.expires_at)
            .bind(&connection.token_type)
            .bind(&connection.scope)
            .bind(Utc::now())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    /// Helper to execute database queries with consistent error handling
    async fn execute_query_with_error_handling<F, T, E>(
        &self,
        operation: &str,
        query_fn: F,
    ) -> Result<T, PersistenceError>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        query_fn.await.map_err(|e| {
            tracing::error!(error = %e, operation = %operation, "Database operation failed.");
            PersistenceError::OperationFailed(e.to_string())
        })
    }
}
