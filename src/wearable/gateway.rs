//! Quota-aware, cached access to vendor data.

use std::{sync::Arc, time::Duration};

use chrono::Utc;

use super::{
    cache::{DataCategory, MetricCaches, Records},
    client::WearableApi,
    error::WearableError,
    payload::{normalize_records, recoveries_from_cycles},
    rate_limiter::{QuotaDecision, RateLimiter},
};
use crate::config::WearableConfig;

/// Front door for every vendor call made by the evaluator.
///
/// Reads are served from the per-patient cache when fresh. Otherwise the
/// shared rate limiter is consulted, the call is recorded against the quota
/// whatever its outcome, vendor quota headers are applied and the normalised
/// records are cached.
pub struct WearableGateway {
    api: Arc<dyn WearableApi>,
    limiter: Arc<RateLimiter>,
    caches: MetricCaches,
    lookback: Duration,
}

impl WearableGateway {
    /// Creates a gateway over `api`, sharing `limiter` with other callers.
    pub fn new(api: Arc<dyn WearableApi>, limiter: Arc<RateLimiter>, config: &WearableConfig) -> Self {
        Self {
            api,
            limiter,
            caches: MetricCaches::from_config(config),
            lookback: config.lookback_secs,
        }
    }

    /// The shared quota manager.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Advisory quota check.
    pub fn can_make_request(&self) -> QuotaDecision {
        self.limiter.can_make_request()
    }

    /// Cached heart rate for a patient, if still fresh.
    pub fn cached_heart_rate(&self, patient_id: i64) -> Option<f64> {
        self.caches.get_heart_rate(patient_id)
    }

    /// Stores a heart rate in the short-lived cache.
    pub fn cache_heart_rate(&self, patient_id: i64, bpm: f64) {
        self.caches.put_heart_rate(patient_id, bpm);
    }

    /// Records of `category` for the trailing lookback window.
    pub async fn fetch_records(
        &self,
        patient_id: i64,
        access_token: &str,
        category: DataCategory,
    ) -> Result<Records, WearableError> {
        if let Some(records) = self.caches.get_records(patient_id, category) {
            tracing::debug!(patient_id, ?category, "Serving wearable data from cache.");
            return Ok(records);
        }

        let decision = self.limiter.can_make_request();
        if !decision.allowed {
            let reason = decision.reason.unwrap_or_else(|| "Rate limit reached".to_string());
            tracing::warn!(patient_id, ?category, %reason, "Wearable call refused by quota.");
            return Err(WearableError::QuotaExceeded { reason, wait: decision.wait });
        }

        let end = Utc::now();
        let start = end - chrono::Duration::from_std(self.lookback).unwrap_or(chrono::Duration::hours(24));
        let result = self.api.fetch(access_token, category, start, end).await;
        self.limiter.record_request();

        let response = result?;
        if let Some(headers) = response.rate_limit {
            self.limiter.update_from_headers(headers);
        }
        let records = Arc::new(normalize_records(response.into_payload()?));
        self.caches.put_records(patient_id, category, records.clone());
        Ok(records)
    }

    /// Recovery records, falling back to the recovery objects embedded in
    /// cycles when the recovery endpoint fails.
    pub async fn fetch_recovery(&self, patient_id: i64, access_token: &str) -> Result<Records, WearableError> {
        match self.fetch_records(patient_id, access_token, DataCategory::Recovery).await {
            Ok(records) => Ok(records),
            Err(error @ WearableError::QuotaExceeded { .. }) => Err(error),
            Err(error) => {
                tracing::debug!(patient_id, error = %error, "Recovery endpoint failed, using cycles.");
                let cycles = self
                    .fetch_records(patient_id, access_token, DataCategory::Cycles)
                    .await
                    .map_err(|_| error)?;
                let recoveries = Arc::new(recoveries_from_cycles(&cycles));
                self.caches.put_records(patient_id, DataCategory::Recovery, recoveries.clone());
                Ok(recoveries)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use serde_json::json;

    use super::*;
    use crate::wearable::{
        client::{MockWearableApi, VendorResponse},
        rate_limiter::RateLimitHeaders,
    };

    fn ok(body: serde_json::Value) -> Result<VendorResponse, WearableError> {
        Ok(VendorResponse {
            path: "/x".into(),
            status: 200,
            rate_limit: None,
            retry_after: None,
            body,
        })
    }

    fn gateway(api: MockWearableApi, limiter: Arc<RateLimiter>) -> WearableGateway {
        WearableGateway::new(Arc::new(api), limiter, &WearableConfig::default())
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let mut api = MockWearableApi::new();
        api.expect_fetch()
            .with(eq("tok"), eq(DataCategory::Cycles), mockall::predicate::always(), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _, _| ok(json!({"records": [{"id": 1}]})));

        let limiter = Arc::new(RateLimiter::new(100, 10_000));
        let gateway = gateway(api, limiter.clone());

        let first = gateway.fetch_records(5, "tok", DataCategory::Cycles).await.unwrap();
        let second = gateway.fetch_records(5, "tok", DataCategory::Cycles).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(limiter.status().per_day.used, 1);
    }

    #[tokio::test]
    async fn test_quota_refusal_skips_vendor_call() {
        let mut api = MockWearableApi::new();
        api.expect_fetch().never();

        let limiter = Arc::new(RateLimiter::new(100, 10_000));
        limiter.set_day_count(10_000);
        let gateway = gateway(api, limiter);

        let error = gateway.fetch_records(5, "tok", DataCategory::Sleep).await.unwrap_err();
        match error {
            WearableError::QuotaExceeded { reason, .. } => {
                assert!(reason.starts_with("Daily rate limit exceeded"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failed_call_still_counts_and_applies_headers() {
        let mut api = MockWearableApi::new();
        api.expect_fetch().times(1).returning(|_, _, _, _| {
            Ok(VendorResponse {
                path: "/cycle".into(),
                status: 429,
                rate_limit: Some(RateLimitHeaders { limit: 100, remaining: 0, reset: i64::MAX / 2 }),
                retry_after: Some(Duration::from_secs(30)),
                body: serde_json::Value::Null,
            })
        });

        let limiter = Arc::new(RateLimiter::new(100, 10_000));
        let gateway = gateway(api, limiter.clone());

        let error = gateway.fetch_records(5, "tok", DataCategory::Cycles).await.unwrap_err();
        assert!(matches!(error, WearableError::RateLimited { .. }));
        assert_eq!(limiter.status().per_minute.used, 1);
        assert!(!limiter.can_make_request().allowed);
    }

    #[tokio::test]
    async fn test_recovery_falls_back_to_cycles() {
        let mut api = MockWearableApi::new();
        api.expect_fetch().with(
            eq("tok"),
            eq(DataCategory::Recovery),
            mockall::predicate::always(),
            mockall::predicate::always(),
        )
        .returning(|_, _, _, _| {
            Ok(VendorResponse {
                path: "/recovery".into(),
                status: 500,
                rate_limit: None,
                retry_after: None,
                body: serde_json::Value::Null,
            })
        });
        api.expect_fetch()
            .with(eq("tok"), eq(DataCategory::Cycles), mockall::predicate::always(), mockall::predicate::always())
            .returning(|_, _, _, _| ok(json!([{"recovery": {"score": {"recovery_score": 64}}}, {"id": 2}])));

        let gateway = gateway(api, Arc::new(RateLimiter::new(100, 10_000)));
        let recoveries = gateway.fetch_recovery(5, "tok").await.unwrap();
        assert_eq!(recoveries.as_slice(), &[json!({"score": {"recovery_score": 64}})]);

        // The fallback result is cached as recovery data.
        let cached = gateway.fetch_recovery(5, "tok").await.unwrap();
        assert!(Arc::ptr_eq(&recoveries, &cached));
    }
}
