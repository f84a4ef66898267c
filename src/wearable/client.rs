//! HTTP client for the wearable vendor's data API.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
#[cfg(test)]
use mockall::automock;
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use url::Url;

use super::{cache::DataCategory, error::WearableError, rate_limiter::RateLimitHeaders};

/// A raw vendor answer, before its status is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorResponse {
    /// Endpoint path the response came from.
    pub path: String,
    /// HTTP status code.
    pub status: u16,
    /// Quota headers, when the vendor sent all three.
    pub rate_limit: Option<RateLimitHeaders>,
    /// Parsed `Retry-After` header.
    pub retry_after: Option<Duration>,
    /// JSON body, or the raw text wrapped in a JSON string when not JSON.
    pub body: Value,
}

impl VendorResponse {
    /// Turns the response into its payload, mapping failure statuses to
    /// errors.
    pub fn into_payload(self) -> Result<Value, WearableError> {
        match self.status {
            200..=299 => Ok(self.body),
            429 => Err(WearableError::RateLimited {
                retry_after: self.retry_after,
                body: describe_body(&self.body, "Too Many Requests"),
            }),
            status => Err(WearableError::Status {
                path: self.path,
                status,
                body: describe_body(&self.body, ""),
            }),
        }
    }
}

fn describe_body(body: &Value, fallback: &str) -> String {
    match body {
        Value::Null => fallback.to_string(),
        Value::String(text) if text.is_empty() => fallback.to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Raw access to the vendor's time-ranged data endpoints.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WearableApi: Send + Sync {
    /// Requests records of `category` in `[start, end]` with a bearer token.
    /// Only transport failures are errors; statuses are left to the caller.
    async fn fetch(
        &self,
        access_token: &str,
        category: DataCategory,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<VendorResponse, WearableError>;
}

/// `WearableApi` over HTTP.
pub struct HttpWearableApi {
    base_url: Url,
    client: Arc<ClientWithMiddleware>,
}

impl HttpWearableApi {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(base_url: &str, client: Arc<ClientWithMiddleware>) -> Result<Self, WearableError> {
        let normalized =
            if base_url.ends_with('/') { base_url.to_string() } else { format!("{base_url}/") };
        let base_url =
            Url::parse(&normalized).map_err(|e| WearableError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self { base_url, client })
    }

    fn endpoint_url(
        &self,
        category: DataCategory,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Url, WearableError> {
        let mut url = self
            .base_url
            .join(category.endpoint())
            .map_err(|e| WearableError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("start", &start.to_rfc3339_opts(SecondsFormat::Millis, true))
            .append_pair("end", &end.to_rfc3339_opts(SecondsFormat::Millis, true));
        Ok(url)
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl WearableApi for HttpWearableApi {
    #[tracing::instrument(skip(self, access_token), level = "debug")]
    async fn fetch(
        &self,
        access_token: &str,
        category: DataCategory,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<VendorResponse, WearableError> {
        let url = self.endpoint_url(category, start, end)?;
        let response = self
            .client
            .get(url.as_str())
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| WearableError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let rate_limit = RateLimitHeaders::from_headers(response.headers());
        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await.map_err(|e| WearableError::Transport(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        tracing::debug!(endpoint = category.endpoint(), status, "Wearable API responded.");
        Ok(VendorResponse { path: url.path().to_string(), status, rate_limit, retry_after, body })
    }
}
