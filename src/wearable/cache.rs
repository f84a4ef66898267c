//! Short-lived per-patient caches for vendor data.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;

use crate::config::WearableConfig;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    cached_at: Instant,
}

/// A per-patient cache whose entries are invalidated purely by age.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: DashMap<i64, CacheEntry<V>>,
}

impl<V: Clone> TtlCache<V> {
    /// Creates an empty cache with the given time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: DashMap::new() }
    }

    /// Returns the cached value if it is at most `ttl` old. Older entries are
    /// evicted and reported as a miss.
    pub fn get(&self, patient_id: i64) -> Option<V> {
        {
            let entry = self.entries.get(&patient_id)?;
            if entry.cached_at.elapsed() <= self.ttl {
                return Some(entry.data.clone());
            }
        }
        // The read guard must be released before removing.
        self.entries.remove_if(&patient_id, |_, entry| entry.cached_at.elapsed() > self.ttl);
        None
    }

    /// Stores `data` with a fresh timestamp, replacing any previous entry.
    pub fn insert(&self, patient_id: i64, data: V) {
        self.entries.insert(patient_id, CacheEntry { data, cached_at: Instant::now() });
    }

    /// Number of entries currently held, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Vendor data families that are fetched and cached independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataCategory {
    /// Physiological cycles, each possibly embedding a recovery object.
    Cycles,
    /// Standalone recovery records.
    Recovery,
    /// Sleep records.
    Sleep,
    /// Workout records.
    Workouts,
}

impl DataCategory {
    /// Endpoint path relative to the API base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            DataCategory::Cycles => "cycle",
            DataCategory::Recovery => "recovery",
            DataCategory::Sleep => "activity/sleep",
            DataCategory::Workouts => "activity/workout",
        }
    }
}

/// Records of one category, shared between concurrent evaluations.
pub type Records = Arc<Vec<Value>>;

/// The five independent caches fronting the vendor API.
#[derive(Debug)]
pub struct MetricCaches {
    heart_rate: TtlCache<f64>,
    cycles: TtlCache<Records>,
    recovery: TtlCache<Records>,
    sleep: TtlCache<Records>,
    workouts: TtlCache<Records>,
}

impl MetricCaches {
    /// Creates caches with separate heart-rate and metric TTLs.
    pub fn new(heart_rate_ttl: Duration, metric_ttl: Duration) -> Self {
        Self {
            heart_rate: TtlCache::new(heart_rate_ttl),
            cycles: TtlCache::new(metric_ttl),
            recovery: TtlCache::new(metric_ttl),
            sleep: TtlCache::new(metric_ttl),
            workouts: TtlCache::new(metric_ttl),
        }
    }

    /// Creates caches using the configured TTLs.
    pub fn from_config(config: &WearableConfig) -> Self {
        Self::new(config.heart_rate_cache_ttl_ms, config.metric_cache_ttl_ms)
    }

    fn records(&self, category: DataCategory) -> &TtlCache<Records> {
        match category {
            DataCategory::Cycles => &self.cycles,
            DataCategory::Recovery => &self.recovery,
            DataCategory::Sleep => &self.sleep,
            DataCategory::Workouts => &self.workouts,
        }
    }

    /// Cached records of `category` for a patient.
    pub fn get_records(&self, patient_id: i64, category: DataCategory) -> Option<Records> {
        self.records(category).get(patient_id)
    }

    /// Caches records of `category` for a patient.
    pub fn put_records(&self, patient_id: i64, category: DataCategory, records: Records) {
        self.records(category).insert(patient_id, records);
    }

    /// Cached heart rate for a patient.
    pub fn get_heart_rate(&self, patient_id: i64) -> Option<f64> {
        self.heart_rate.get(patient_id)
    }

    /// Caches a heart rate for a patient.
    pub fn put_heart_rate(&self, patient_id: i64, bpm: f64) {
        self.heart_rate.insert(patient_id, bpm);
    }
}
