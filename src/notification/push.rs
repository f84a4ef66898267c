//! Delivery of single-device pushes through an HTTP push gateway.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
#[cfg(test)]
use mockall::automock;
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use reqwest_middleware::ClientWithMiddleware;
use sha2::Sha256;

use super::{error::NotificationError, payload_builder::build_push_payload};
use crate::{models::PushMessage, persistence::traits::CareRepository};

type HmacSha256 = Hmac<Sha256>;

/// Error codes the gateway uses for tokens that will never be deliverable.
const INVALID_TOKEN_CODES: [&str; 2] =
    ["invalid-registration-token", "registration-token-not-registered"];

/// Sends one push to one device.
///
/// Implementations swallow delivery failures: `true` means delivered,
/// `false` means the push was not delivered (including invalid tokens, which
/// the transport cleans up itself).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, message: &PushMessage) -> bool;
}

/// Computes the hex HMAC-SHA256 of the serialized payload followed by
/// `timestamp_millis`.
pub fn sign_payload(
    secret: &str,
    payload: &serde_json::Value,
    timestamp_millis: i64,
) -> Result<String, NotificationError> {
    // `new_from_slice` accepts empty keys.
    if secret.is_empty() {
        return Err(NotificationError::ConfigError("Invalid secret: cannot be empty.".into()));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| NotificationError::ConfigError(format!("Invalid secret: {e}")))?;
    let serialized = serde_json::to_string(payload).map_err(|e| {
        NotificationError::InternalError(format!("Failed to serialize payload: {e}"))
    })?;
    mac.update(format!("{serialized}{timestamp_millis}").as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Extracts the gateway's error code from a JSON error body, accepting both
/// `{"code": ..}` and `{"error": {"code": ..}}` with an optional
/// `messaging/` prefix.
fn error_code(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let code = value
        .get("code")
        .or_else(|| value.get("error").and_then(|e| e.get("code")))
        .and_then(|c| c.as_str())?;
    Some(code.trim_start_matches("messaging/").to_string())
}

fn is_invalid_token(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return true;
    }
    error_code(body).is_some_and(|code| INVALID_TOKEN_CODES.contains(&code.as_str()))
}

fn token_prefix(token: &str) -> &str {
    token.char_indices().nth(20).map_or(token, |(idx, _)| &token[..idx])
}

/// Posts pushes to the configured gateway URL.
pub struct HttpPushTransport {
    url: String,
    client: Arc<ClientWithMiddleware>,
    secret: Option<String>,
    repository: Arc<dyn CareRepository>,
}

impl HttpPushTransport {
    pub fn new(
        url: String,
        client: Arc<ClientWithMiddleware>,
        secret: Option<String>,
        repository: Arc<dyn CareRepository>,
    ) -> Self {
        Self { url, client, secret, repository }
    }

    async fn post(&self, message: &PushMessage) -> Result<bool, NotificationError> {
        let payload = build_push_payload(message);

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        );
        if let Some(secret) = &self.secret {
            let timestamp = Utc::now().timestamp_millis();
            let signature = sign_payload(secret, &payload, timestamp)?;
            headers.insert(
                HeaderName::from_static("x-signature"),
                HeaderValue::from_str(&signature).map_err(|e| {
                    NotificationError::NotifyFailed(format!("Invalid signature value: {e}"))
                })?,
            );
            headers.insert(
                HeaderName::from_static("x-timestamp"),
                HeaderValue::from_str(&timestamp.to_string()).map_err(|e| {
                    NotificationError::NotifyFailed(format!("Invalid timestamp value: {e}"))
                })?,
            );
        }

        let response = self.client.post(&self.url).headers(headers).json(&payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        if is_invalid_token(status, &body) {
            tracing::info!(token = token_prefix(&message.token), "Invalid device token, removing.");
            self.repository.delete_device_token(&message.token).await?;
            return Ok(false);
        }

        Err(NotificationError::NotifyFailed(format!(
            "Push gateway request failed with status {status}: {body}"
        )))
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(&self, message: &PushMessage) -> bool {
        match self.post(message).await {
            Ok(delivered) => delivered,
            Err(e) => {
                tracing::error!(
                    token = token_prefix(&message.token),
                    error = %e,
                    "Failed to send push notification."
                );
                false
            }
        }
    }
}

/// Used when no gateway URL is configured; every push is reported as
/// undelivered.
#[derive(Debug, Default)]
pub struct DisabledPushTransport;

#[async_trait]
impl PushTransport for DisabledPushTransport {
    async fn send(&self, message: &PushMessage) -> bool {
        tracing::warn!(
            token = token_prefix(&message.token),
            "Push gateway not configured, notification dropped."
        );
        false
    }
}
