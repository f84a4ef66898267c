//! Resolution of an alert's metric to a current numeric value.
//!
//! Resolution never fails outright: every failure collapses into an absent
//! value plus a diagnostic string.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use super::metric_path::{FieldPath, MetricPath, numeric};
use crate::{
    config::WearableConfig,
    models::{Alert, CheckInStatus},
    persistence::CareRepository,
    wearable::{AccessTokenProvider, DataCategory, WearableError, WearableGateway},
};

/// Workout fields checked, in order, for a heart-rate value.
const WORKOUT_HEART_RATE_FIELDS: &[&str] = &[
    "score.average_heart_rate",
    "score.max_heart_rate",
    "score.heart_rate",
    "heart_rate",
    "hr",
    "average_heart_rate",
    "avg_heart_rate",
    "max_heart_rate",
    "heartRate",
    "averageHeartRate",
    "maxHeartRate",
];

/// Recovery fields checked, in order, for a heart-rate value.
const RECOVERY_HEART_RATE_FIELDS: &[&str] =
    &["score.resting_heart_rate", "score.heart_rate", "resting_heart_rate", "heart_rate"];

/// Outcome of resolving one metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricResolution {
    /// The finite metric value, when it could be determined.
    pub value: Option<f64>,
    /// Why the value could not be determined.
    pub error: Option<String>,
}

impl MetricResolution {
    /// A resolved value, or an absent one without diagnostic.
    pub fn value(value: Option<f64>) -> Self {
        Self { value: value.filter(|v| v.is_finite()), error: None }
    }

    /// An absent value with a diagnostic.
    pub fn failed(error: impl Into<String>) -> Self {
        Self { value: None, error: Some(error.into()) }
    }
}

/// Produces the current value of an alert's metric.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Resolves `alert`'s metric for `patient_id`. Never fails.
    async fn resolve(&self, alert: &Alert, patient_id: i64) -> MetricResolution;
}

/// Resolves metrics from medication check-ins, stored heart-rate readings
/// and the wearable vendor.
pub struct WearableMetricResolver {
    repository: Arc<dyn CareRepository>,
    gateway: Arc<WearableGateway>,
    tokens: Arc<dyn AccessTokenProvider>,
    lookback: Duration,
    recent_reading_max_age: Duration,
}

impl WearableMetricResolver {
    /// Creates a resolver over the given collaborators.
    pub fn new(
        repository: Arc<dyn CareRepository>,
        gateway: Arc<WearableGateway>,
        tokens: Arc<dyn AccessTokenProvider>,
        config: &WearableConfig,
    ) -> Self {
        Self {
            repository,
            gateway,
            tokens,
            lookback: config.lookback_secs,
            recent_reading_max_age: config.recent_reading_max_age_secs,
        }
    }

    async fn missed_doses(&self, patient_id: i64) -> MetricResolution {
        let since = Utc::now() - chrono::Duration::from_std(self.lookback).unwrap_or(chrono::Duration::hours(24));
        match self.repository.list_recent_check_ins(patient_id, CheckInStatus::Missed, since).await {
            Ok(check_ins) => MetricResolution::value(Some(check_ins.len() as f64)),
            Err(e) => MetricResolution::failed(e.to_string()),
        }
    }

    async fn heart_rate(&self, patient_id: i64) -> MetricResolution {
        if let Some(bpm) = self.gateway.cached_heart_rate(patient_id) {
            return MetricResolution::value(Some(bpm));
        }

        match self.repository.get_latest_heart_rate_reading(patient_id).await {
            Ok(Some(reading)) => {
                let age = (Utc::now() - reading.timestamp).to_std().unwrap_or_default();
                if age <= self.recent_reading_max_age {
                    return MetricResolution::value(Some(reading.heart_rate as f64));
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(patient_id, error = %e, "Failed to load latest heart-rate reading.");
            }
        }

        let decision = self.gateway.can_make_request();
        if !decision.allowed {
            return MetricResolution::failed(
                decision.reason.unwrap_or_else(|| "Rate limit reached".to_string()),
            );
        }

        match self.vendor_heart_rate(patient_id).await {
            Ok(Some(bpm)) => {
                self.gateway.cache_heart_rate(patient_id, bpm);
                MetricResolution::value(Some(bpm))
            }
            Ok(None) => MetricResolution::failed("No heart-rate data available"),
            Err(e) => MetricResolution::failed(e.to_string()),
        }
    }

    /// Tries workouts, then cycles, then recovery records. A failing source
    /// is logged and skipped; only a quota refusal ends the chain early.
    async fn vendor_heart_rate(&self, patient_id: i64) -> Result<Option<f64>, WearableError> {
        let token = self.tokens.ensure_valid_access_token(patient_id).await?;
        let mut last_error = None;

        match self.gateway.fetch_records(patient_id, &token, DataCategory::Workouts).await {
            Ok(workouts) => {
                if let Some(bpm) =
                    workouts.iter().find_map(|w| first_heart_rate(w, WORKOUT_HEART_RATE_FIELDS))
                {
                    return Ok(Some(bpm));
                }
            }
            Err(e @ WearableError::QuotaExceeded { .. }) => return Err(e),
            Err(e) => {
                tracing::warn!(patient_id, error = %e, "Workouts unavailable for heart rate.");
                last_error = Some(e);
            }
        }

        match self.gateway.fetch_records(patient_id, &token, DataCategory::Cycles).await {
            Ok(cycles) => {
                if let Some(bpm) = first_record(&cycles).and_then(cycle_heart_rate) {
                    return Ok(Some(bpm));
                }
            }
            Err(e @ WearableError::QuotaExceeded { .. }) => return Err(e),
            Err(e) => {
                tracing::warn!(patient_id, error = %e, "Cycles unavailable for heart rate.");
                last_error = Some(e);
            }
        }

        match self.gateway.fetch_recovery(patient_id, &token).await {
            Ok(recoveries) => {
                if let Some(bpm) =
                    first_record(&recoveries).and_then(|r| first_heart_rate(r, RECOVERY_HEART_RATE_FIELDS))
                {
                    return Ok(Some(bpm));
                }
            }
            Err(e @ WearableError::QuotaExceeded { .. }) => return Err(e),
            Err(e) => {
                tracing::warn!(patient_id, error = %e, "Recovery unavailable for heart rate.");
                last_error = Some(e);
            }
        }

        last_error.map_or(Ok(None), Err)
    }

    async fn vendor_field(&self, patient_id: i64, path: &MetricPath) -> Result<Option<f64>, WearableError> {
        let token = self.tokens.ensure_valid_access_token(patient_id).await?;

        match path {
            MetricPath::Recovery(field) => {
                let cycles = self.gateway.fetch_records(patient_id, &token, DataCategory::Cycles).await?;
                let from_cycle = cycles
                    .first()
                    .and_then(|cycle| cycle.get("recovery"))
                    .and_then(|recovery| field.resolve(recovery));
                if from_cycle.is_some() {
                    return Ok(from_cycle);
                }
                let recoveries = self.gateway.fetch_recovery(patient_id, &token).await?;
                Ok(first_record(&recoveries).and_then(|r| field.resolve(r)))
            }
            MetricPath::Sleep { relative, full } => {
                let sleep = self.gateway.fetch_records(patient_id, &token, DataCategory::Sleep).await?;
                Ok(first_record(&sleep).and_then(|s| relative.resolve(s).or_else(|| full.resolve(s))))
            }
            MetricPath::Cycle(field) => {
                let cycles = self.gateway.fetch_records(patient_id, &token, DataCategory::Cycles).await?;
                if let Some(value) = first_record(&cycles).and_then(|c| field.resolve(c)) {
                    return Ok(Some(value));
                }
                let recoveries = self.gateway.fetch_recovery(patient_id, &token).await?;
                Ok(first_record(&recoveries).and_then(|r| field.resolve(r)))
            }
            MetricPath::MissedDoses | MetricPath::HeartRate => Ok(None),
        }
    }
}

fn first_record(records: &[Value]) -> Option<&Value> {
    records.first()
}

/// Resting heart rate from a cycle's embedded recovery, or the cycle itself.
fn cycle_heart_rate(cycle: &Value) -> Option<f64> {
    cycle
        .get("recovery")
        .and_then(|recovery| first_heart_rate(recovery, RECOVERY_HEART_RATE_FIELDS))
        .or_else(|| first_heart_rate(cycle, RECOVERY_HEART_RATE_FIELDS))
}

/// The first listed field holding a positive, finite number.
fn first_heart_rate(record: &Value, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|field| {
        let path = FieldPath::parse(field).ok()?;
        let mut current = record;
        for segment in path.segments() {
            current = current.get(segment)?;
        }
        match current {
            Value::Number(_) => numeric(current).filter(|bpm| *bpm > 0.0),
            _ => None,
        }
    })
}

#[async_trait]
impl MetricSource for WearableMetricResolver {
    async fn resolve(&self, alert: &Alert, patient_id: i64) -> MetricResolution {
        let path = match MetricPath::parse(alert.metric_type, &alert.metric_path) {
            Ok(path) => path,
            Err(e) => return MetricResolution::failed(e.to_string()),
        };

        let resolution = match &path {
            MetricPath::MissedDoses => self.missed_doses(patient_id).await,
            MetricPath::HeartRate => self.heart_rate(patient_id).await,
            other => match self.vendor_field(patient_id, other).await {
                Ok(value) => MetricResolution::value(value),
                Err(e) => MetricResolution::failed(e.to_string()),
            },
        };

        if let Some(error) = &resolution.error {
            tracing::debug!(alert_id = alert.id, patient_id, %error, "Metric could not be resolved.");
        }
        resolution
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::{always, eq};
    use serde_json::json;

    use super::*;
    use crate::{
        models::{CheckIn, HeartRateReading, ReadingSource},
        persistence::traits::MockCareRepository,
        test_helpers::AlertBuilder,
        wearable::{
            RateLimiter, TokenError, VendorResponse, client::MockWearableApi,
            token::MockAccessTokenProvider,
        },
    };

    fn vendor_ok(body: Value) -> Result<VendorResponse, WearableError> {
        Ok(VendorResponse { path: "/".into(), status: 200, rate_limit: None, retry_after: None, body })
    }

    struct Fixture {
        repo: MockCareRepository,
        api: MockWearableApi,
        tokens: MockAccessTokenProvider,
        limiter: Arc<RateLimiter>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                repo: MockCareRepository::new(),
                api: MockWearableApi::new(),
                tokens: MockAccessTokenProvider::new(),
                limiter: Arc::new(RateLimiter::new(100, 10_000)),
            }
        }

        fn connected(mut self) -> Self {
            self.tokens.expect_ensure_valid_access_token().returning(|_| Ok("tok".to_string()));
            self
        }

        fn build(self) -> (WearableMetricResolver, Arc<WearableGateway>) {
            let config = WearableConfig::default();
            let gateway = Arc::new(WearableGateway::new(Arc::new(self.api), self.limiter, &config));
            let resolver = WearableMetricResolver::new(
                Arc::new(self.repo),
                gateway.clone(),
                Arc::new(self.tokens),
                &config,
            );
            (resolver, gateway)
        }
    }

    #[tokio::test]
    async fn test_missed_doses_counts_recent_missed_check_ins() {
        let mut fixture = Fixture::new();
        fixture
            .repo
            .expect_list_recent_check_ins()
            .with(eq(9), eq(CheckInStatus::Missed), always())
            .returning(|patient_id, status, _| {
                Ok((0..3)
                    .map(|i| CheckIn {
                        id: i,
                        patient_id,
                        medication_id: Some(1),
                        status,
                        taken_at: Some(Utc::now()),
                    })
                    .collect())
            });
        let (resolver, _) = fixture.build();

        let alert = AlertBuilder::new(9).medication("missed_dose").build();
        assert_eq!(resolver.resolve(&alert, 9).await, MetricResolution::value(Some(3.0)));
    }

    #[tokio::test]
    async fn test_unknown_medication_metric_is_reported() {
        let (resolver, _) = Fixture::new().build();
        let alert = AlertBuilder::new(9).medication("doses_taken").build();

        let resolution = resolver.resolve(&alert, 9).await;
        assert_eq!(resolution.value, None);
        assert_eq!(resolution.error.as_deref(), Some("Unknown medication metric: doses_taken"));
    }

    #[tokio::test]
    async fn test_heart_rate_prefers_cache() {
        let mut fixture = Fixture::new();
        fixture.repo.expect_get_latest_heart_rate_reading().never();
        let (resolver, gateway) = fixture.build();
        gateway.cache_heart_rate(9, 120.0);

        let alert = AlertBuilder::new(9).whoop("heart_rate").build();
        assert_eq!(resolver.resolve(&alert, 9).await.value, Some(120.0));
    }

    #[tokio::test]
    async fn test_heart_rate_uses_recent_reading() {
        let mut fixture = Fixture::new();
        fixture.repo.expect_get_latest_heart_rate_reading().returning(|patient_id| {
            Ok(Some(HeartRateReading {
                id: 1,
                patient_id,
                heart_rate: 84,
                source: ReadingSource::Bluetooth,
                timestamp: Utc::now() - chrono::Duration::minutes(2),
            }))
        });
        fixture.api.expect_fetch().never();
        let (resolver, _) = fixture.build();

        let alert = AlertBuilder::new(9).whoop("heartrate").build();
        assert_eq!(resolver.resolve(&alert, 9).await.value, Some(84.0));
    }

    #[tokio::test]
    async fn test_stale_reading_falls_through_to_workouts_then_caches() {
        let mut fixture = Fixture::new().connected();
        fixture.repo.expect_get_latest_heart_rate_reading().returning(|patient_id| {
            Ok(Some(HeartRateReading {
                id: 1,
                patient_id,
                heart_rate: 60,
                source: ReadingSource::Api,
                timestamp: Utc::now() - chrono::Duration::minutes(30),
            }))
        });
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Workouts), always(), always())
            .times(1)
            .returning(|_, _, _, _| {
                vendor_ok(json!({"records": [{"score": {"strain": 4}}, {"score": {"max_heart_rate": 142}}]}))
            });
        let (resolver, gateway) = fixture.build();

        let alert = AlertBuilder::new(9).whoop("heart_rate").build();
        assert_eq!(resolver.resolve(&alert, 9).await.value, Some(142.0));
        assert_eq!(gateway.cached_heart_rate(9), Some(142.0));
    }

    #[tokio::test]
    async fn test_heart_rate_falls_back_to_cycle_recovery() {
        let mut fixture = Fixture::new().connected();
        fixture.repo.expect_get_latest_heart_rate_reading().returning(|_| Ok(None));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Workouts), always(), always())
            .returning(|_, _, _, _| vendor_ok(json!([])));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Cycles), always(), always())
            .returning(|_, _, _, _| {
                vendor_ok(json!([{"recovery": {"score": {"resting_heart_rate": 0, "heart_rate": 58}}}]))
            });
        let (resolver, _) = fixture.build();

        let alert = AlertBuilder::new(9).whoop("heart_rate").build();
        assert_eq!(resolver.resolve(&alert, 9).await.value, Some(58.0));
    }

    fn vendor_error(status: u16) -> Result<VendorResponse, WearableError> {
        Ok(VendorResponse {
            path: "/w".into(),
            status,
            rate_limit: None,
            retry_after: None,
            body: Value::Null,
        })
    }

    #[tokio::test]
    async fn test_failed_workouts_fall_through_to_cycles() {
        let mut fixture = Fixture::new().connected();
        fixture.repo.expect_get_latest_heart_rate_reading().returning(|_| Ok(None));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Workouts), always(), always())
            .times(1)
            .returning(|_, _, _, _| vendor_error(500));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Cycles), always(), always())
            .times(1)
            .returning(|_, _, _, _| vendor_ok(json!([{"resting_heart_rate": 58}])));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Recovery), always(), always())
            .never();
        let (resolver, gateway) = fixture.build();

        let alert = AlertBuilder::new(9).whoop("heart_rate").build();
        assert_eq!(resolver.resolve(&alert, 9).await, MetricResolution::value(Some(58.0)));
        assert_eq!(gateway.cached_heart_rate(9), Some(58.0));
    }

    #[tokio::test]
    async fn test_heart_rate_falls_back_to_recovery_records() {
        let mut fixture = Fixture::new().connected();
        fixture.repo.expect_get_latest_heart_rate_reading().returning(|_| Ok(None));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Workouts), always(), always())
            .returning(|_, _, _, _| vendor_ok(json!([])));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Cycles), always(), always())
            .returning(|_, _, _, _| vendor_ok(json!([{"score": {"strain": 6.5}}])));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Recovery), always(), always())
            .times(1)
            .returning(|_, _, _, _| vendor_ok(json!({"records": [{"score": {"resting_heart_rate": 52}}]})));
        let (resolver, _) = fixture.build();

        let alert = AlertBuilder::new(9).whoop("heart_rate").build();
        assert_eq!(resolver.resolve(&alert, 9).await.value, Some(52.0));
    }

    #[tokio::test]
    async fn test_heart_rate_reports_last_error_when_every_source_fails() {
        let mut fixture = Fixture::new().connected();
        fixture.repo.expect_get_latest_heart_rate_reading().returning(|_| Ok(None));
        fixture.api.expect_fetch().returning(|_, _, _, _| vendor_error(503));
        let (resolver, gateway) = fixture.build();

        let alert = AlertBuilder::new(9).whoop("heart_rate").build();
        let resolution = resolver.resolve(&alert, 9).await;
        assert_eq!(resolution.value, None);
        assert_eq!(resolution.error.as_deref(), Some("Failed to fetch wearable data (/w): 503 - "));
        assert_eq!(gateway.cached_heart_rate(9), None);
    }

    #[tokio::test]
    async fn test_quota_refusal_stops_heart_rate_fallbacks() {
        let mut fixture = Fixture::new().connected();
        fixture.limiter = Arc::new(RateLimiter::new(1, 10_000));
        fixture.repo.expect_get_latest_heart_rate_reading().returning(|_| Ok(None));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Workouts), always(), always())
            .times(1)
            .returning(|_, _, _, _| vendor_error(500));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Cycles), always(), always())
            .never();
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Recovery), always(), always())
            .never();
        let (resolver, _) = fixture.build();

        let alert = AlertBuilder::new(9).whoop("heart_rate").build();
        let resolution = resolver.resolve(&alert, 9).await;
        assert_eq!(resolution.value, None);
        assert!(resolution.error.unwrap().starts_with("Per-minute rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_heart_rate_without_any_source_is_absent() {
        let mut fixture = Fixture::new();
        fixture.repo.expect_get_latest_heart_rate_reading().returning(|_| Ok(None));
        fixture
            .tokens
            .expect_ensure_valid_access_token()
            .returning(|patient_id| Err(TokenError::ConnectionNotFound(patient_id)));
        let (resolver, _) = fixture.build();

        let alert = AlertBuilder::new(9).whoop("heart_rate").build();
        let resolution = resolver.resolve(&alert, 9).await;
        assert_eq!(resolution.value, None);
        assert_eq!(resolution.error.as_deref(), Some("No wearable connection found for patient 9"));
    }

    #[tokio::test]
    async fn test_heart_rate_refused_by_quota() {
        let mut fixture = Fixture::new();
        fixture.repo.expect_get_latest_heart_rate_reading().returning(|_| Ok(None));
        fixture.tokens.expect_ensure_valid_access_token().never();
        fixture.limiter.set_day_count(10_000);
        let (resolver, _) = fixture.build();

        let alert = AlertBuilder::new(9).whoop("heart_rate").build();
        let resolution = resolver.resolve(&alert, 9).await;
        assert_eq!(resolution.value, None);
        assert!(resolution.error.unwrap().starts_with("Daily rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_recovery_path_reads_cycle_recovery() {
        let mut fixture = Fixture::new().connected();
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Cycles), always(), always())
            .times(1)
            .returning(|_, _, _, _| vendor_ok(json!([{"recovery": {"score": {"recovery_score": 33}}}])));
        let (resolver, _) = fixture.build();

        let alert = AlertBuilder::new(9).whoop("recovery.score.recovery_score").build();
        assert_eq!(resolver.resolve(&alert, 9).await.value, Some(33.0));
    }

    #[tokio::test]
    async fn test_recovery_path_falls_back_to_recovery_endpoint() {
        let mut fixture = Fixture::new().connected();
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Cycles), always(), always())
            .returning(|_, _, _, _| vendor_ok(json!([{"score": {"strain": 8}}])));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Recovery), always(), always())
            .returning(|_, _, _, _| vendor_ok(json!({"records": [{"score": {"hrv_rmssd_milli": "41.5"}}]})));
        let (resolver, _) = fixture.build();

        let alert = AlertBuilder::new(9).whoop("recovery.score.hrv_rmssd_milli").build();
        assert_eq!(resolver.resolve(&alert, 9).await.value, Some(41.5));
    }

    #[tokio::test]
    async fn test_sleep_and_cycle_paths() {
        let mut fixture = Fixture::new().connected();
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Sleep), always(), always())
            .returning(|_, _, _, _| vendor_ok(json!([{"score": {"sleep_efficiency_percentage": 87.1}}])));
        fixture
            .api
            .expect_fetch()
            .with(eq("tok"), eq(DataCategory::Cycles), always(), always())
            .returning(|_, _, _, _| vendor_ok(json!([{"score": {"strain": 14.2}}])));
        let (resolver, _) = fixture.build();

        let sleep = AlertBuilder::new(9).whoop("sleep.score.sleep_efficiency_percentage").build();
        assert_eq!(resolver.resolve(&sleep, 9).await.value, Some(87.1));

        let strain = AlertBuilder::new(9).whoop("score.strain").build();
        assert_eq!(resolver.resolve(&strain, 9).await.value, Some(14.2));
    }

    #[test]
    fn test_first_heart_rate_skips_zero_and_strings() {
        let record = json!({"score": {"average_heart_rate": 0}, "hr": "90", "avg_heart_rate": 77});
        assert_eq!(first_heart_rate(&record, WORKOUT_HEART_RATE_FIELDS), Some(77.0));
    }
}
