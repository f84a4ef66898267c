//! Access-token acquisition for the wearable vendor.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use reqwest::header::ACCEPT;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::error::TokenError;
use crate::{
    config::WearableConfig,
    models::{RefreshedTokens, WearableConnection},
    persistence::CareRepository,
};

/// Tokens are refreshed this long before their reported expiry.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Supplies a currently-valid vendor access token for a patient.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Returns a usable access token, refreshing it first if needed.
    async fn ensure_valid_access_token(&self, patient_id: i64) -> Result<String, TokenError>;
}

/// `now + expires_in`, or no expiry when the vendor's value is out of range.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(expires_in).and_then(|ttl| now.checked_add_signed(ttl))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Reads connections from the repository and refreshes them through the
/// vendor OAuth token endpoint.
pub struct RepositoryTokenProvider {
    repository: Arc<dyn CareRepository>,
    client: Arc<ClientWithMiddleware>,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl RepositoryTokenProvider {
    /// Creates a provider using the OAuth settings of `config`.
    pub fn new(
        repository: Arc<dyn CareRepository>,
        client: Arc<ClientWithMiddleware>,
        config: &WearableConfig,
    ) -> Self {
        Self {
            repository,
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_locks: DashMap::new(),
        }
    }

    fn refresh_lock(&self, patient_id: i64) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(patient_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load(&self, patient_id: i64) -> Result<WearableConnection, TokenError> {
        self.repository
            .get_wearable_connection(patient_id)
            .await?
            .ok_or(TokenError::ConnectionNotFound(patient_id))
    }

    async fn refresh(&self, connection: &WearableConnection) -> Result<RefreshedTokens, TokenError> {
        let refresh_token = connection
            .refresh_token
            .as_deref()
            .ok_or(TokenError::MissingRefreshToken(connection.patient_id))?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let response = self
            .client
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| TokenError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::RefreshFailed(format!("{status} - {body}")));
        }

        let tokens: TokenResponse =
            response.json().await.map_err(|e| TokenError::RefreshFailed(e.to_string()))?;
        Ok(RefreshedTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_in.and_then(|secs| expiry_after(Utc::now(), secs)),
        })
    }
}

#[async_trait]
impl AccessTokenProvider for RepositoryTokenProvider {
    async fn ensure_valid_access_token(&self, patient_id: i64) -> Result<String, TokenError> {
        let margin = Duration::seconds(REFRESH_MARGIN_SECS);
        let connection = self.load(patient_id).await?;
        if !connection.expires_within(Utc::now(), margin) {
            return Ok(connection.access_token);
        }

        let lock = self.refresh_lock(patient_id);
        let _guard = lock.lock().await;

        // Another caller may have refreshed while we waited.
        let connection = self.load(patient_id).await?;
        if !connection.expires_within(Utc::now(), margin) {
            return Ok(connection.access_token);
        }

        tracing::info!(patient_id, "Refreshing wearable access token.");
        let tokens = self.refresh(&connection).await.inspect_err(|e| {
            tracing::warn!(patient_id, error = %e, "Wearable token refresh failed.");
        })?;
        self.repository.update_wearable_tokens(patient_id, &tokens).await?;
        Ok(tokens.access_token)
    }
}
