//! In-memory record of which alerts are currently active per patient.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Tracks, per patient, the alerts that were active at the last evaluation
/// and when each first became active.
///
/// The tracker is not persisted: after a restart every alert is considered
/// inactive until it is evaluated again.
#[derive(Debug, Default)]
pub struct AlertStateTracker {
    patients: DashMap<i64, HashMap<i64, DateTime<Utc>>>,
}

impl AlertStateTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts in `active` that were not active at the previous commit.
    pub fn diff(&self, patient_id: i64, active: &HashSet<i64>) -> HashSet<i64> {
        match self.patients.get(&patient_id) {
            Some(previous) => active.iter().filter(|id| !previous.contains_key(id)).copied().collect(),
            None => active.clone(),
        }
    }

    /// Replaces the patient's active set.
    ///
    /// Alerts that stay active keep their original activation time; newly
    /// added ones are stamped now. An empty set removes the patient.
    pub fn commit(&self, patient_id: i64, active: &HashSet<i64>) {
        self.commit_at(patient_id, active, Utc::now());
    }

    fn commit_at(&self, patient_id: i64, active: &HashSet<i64>, now: DateTime<Utc>) {
        if active.is_empty() {
            self.patients.remove(&patient_id);
            return;
        }

        let mut entry = self.patients.entry(patient_id).or_default();
        entry.retain(|id, _| active.contains(id));
        for id in active {
            entry.entry(*id).or_insert(now);
        }
    }

    /// Snapshot of the patient's tracked alert ids, sorted.
    pub fn query(&self, patient_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .patients
            .get(&patient_id)
            .map(|alerts| alerts.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// When `alert_id` became active for the patient, if it is tracked.
    pub fn activated_at(&self, patient_id: i64, alert_id: i64) -> Option<DateTime<Utc>> {
        self.patients.get(&patient_id)?.get(&alert_id).copied()
    }

    /// Number of patients with at least one active alert.
    pub fn tracked_patients(&self) -> usize {
        self.patients.len()
    }
}
