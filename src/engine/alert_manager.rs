//! Alert management module
//!
//! Folds evaluation results into the [`AlertStateTracker`] and dispatches
//! notifications for alerts that just became active.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use super::{
    evaluator::{AlertEvaluator, EvaluatorError},
    state_tracker::AlertStateTracker,
};
use crate::{
    models::{ActiveAlertRecord, AlertPriority},
    notification::NotificationService,
    persistence::{AlertFilter, CareRepository, error::PersistenceError},
};

/// Errors that can occur within the AlertManager
#[derive(Debug, Error)]
pub enum AlertManagerError {
    /// The tier's alerts could not be loaded.
    #[error("Failed to load {tier} priority alerts: {source}")]
    LoadTier {
        /// The tier being processed.
        tier: AlertPriority,
        /// The underlying storage error.
        source: PersistenceError,
    },

    /// A patient's alerts could not be evaluated.
    #[error("Evaluation error: {0}")]
    Evaluator(#[from] EvaluatorError),
}

/// Summary of one tier tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierReport {
    /// Patients with at least one enabled alert in the tier.
    pub patients: usize,
    /// Patients whose pass failed and was skipped.
    pub failed_patients: usize,
    /// Alerts that became active during the tick, by alert id.
    pub newly_triggered: Vec<i64>,
}

/// Which alerts a pass is allowed to move in or out of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassScope {
    /// Only the given tier; other tiers' tracked alerts are left alone.
    Tier(AlertPriority),
    /// Every enabled alert of the patient.
    AllTiers,
}

/// The AlertManager drives evaluation passes and turns state transitions
/// into notifications.
///
/// Passes for the same patient are serialized with a per-patient lock, so
/// tier ticks and live readings never interleave their diff, dispatch and
/// commit steps.
pub struct AlertManager {
    repository: Arc<dyn CareRepository>,
    evaluator: Arc<AlertEvaluator>,
    tracker: Arc<AlertStateTracker>,
    notifier: Arc<NotificationService>,

    /// A map of patient ids to their locks to prevent race conditions.
    patient_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl AlertManager {
    /// Creates a new AlertManager instance
    pub fn new(
        repository: Arc<dyn CareRepository>,
        evaluator: Arc<AlertEvaluator>,
        tracker: Arc<AlertStateTracker>,
        notifier: Arc<NotificationService>,
    ) -> Self {
        Self { repository, evaluator, tracker, notifier, patient_locks: DashMap::new() }
    }

    /// The state tracker this manager commits into.
    pub fn tracker(&self) -> &Arc<AlertStateTracker> {
        &self.tracker
    }

    fn get_patient_lock(&self, patient_id: i64) -> Arc<Mutex<()>> {
        self.patient_locks.entry(patient_id).or_default().clone()
    }

    /// Runs one tick of `tier`: every patient owning an enabled alert of the
    /// tier gets a scoped pass. A failing patient is logged and skipped.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn process_tier(&self, tier: AlertPriority) -> Result<TierReport, AlertManagerError> {
        let alerts = self
            .repository
            .list_enabled_alerts(AlertFilter::for_priority(tier))
            .await
            .map_err(|source| AlertManagerError::LoadTier { tier, source })?;

        let mut by_patient: BTreeMap<i64, usize> = BTreeMap::new();
        for alert in &alerts {
            *by_patient.entry(alert.patient_id).or_default() += 1;
        }

        let mut report = TierReport { patients: by_patient.len(), ..Default::default() };
        for (patient_id, alert_count) in by_patient {
            match self.process_patient(patient_id, PassScope::Tier(tier)).await {
                Ok(mut triggered) => report.newly_triggered.append(&mut triggered),
                Err(e) => {
                    report.failed_patients += 1;
                    tracing::error!(
                        patient_id,
                        %tier,
                        alert_count,
                        error = %e,
                        "Failed to process patient alerts."
                    );
                }
            }
        }

        tracing::debug!(
            %tier,
            patients = report.patients,
            triggered = report.newly_triggered.len(),
            "Tier tick completed."
        );
        Ok(report)
    }

    /// Evaluates the patient's alerts, dispatches notifications for alerts
    /// in `scope` that just became active and commits the new state.
    ///
    /// Returns the newly-triggered alert ids in ascending order.
    pub async fn process_patient(
        &self,
        patient_id: i64,
        scope: PassScope,
    ) -> Result<Vec<i64>, AlertManagerError> {
        let lock = self.get_patient_lock(patient_id);
        let _guard = lock.lock().await;

        let evaluation = self.evaluator.evaluate_patient(patient_id).await?;

        let scoped_active: Vec<&ActiveAlertRecord> = evaluation
            .active
            .iter()
            .filter(|record| match scope {
                PassScope::Tier(tier) => record.alert.priority == tier,
                PassScope::AllTiers => true,
            })
            .collect();
        let scoped_ids: HashSet<i64> = scoped_active.iter().map(|r| r.alert.id).collect();

        let next = match scope {
            PassScope::Tier(tier) => {
                let enabled = evaluation.enabled_ids();
                let tier_ids = evaluation.tier_ids(tier);
                let mut next: HashSet<i64> = self
                    .tracker
                    .query(patient_id)
                    .into_iter()
                    .filter(|id| enabled.contains(id) && !tier_ids.contains(id))
                    .collect();
                next.extend(&scoped_ids);
                next
            }
            PassScope::AllTiers => scoped_ids.clone(),
        };

        let newly = self.tracker.diff(patient_id, &scoped_ids);
        let mut triggered: Vec<&ActiveAlertRecord> =
            scoped_active.into_iter().filter(|r| newly.contains(&r.alert.id)).collect();
        triggered.sort_by_key(|r| r.alert.id);

        for record in &triggered {
            let alert = &record.alert;
            tracing::info!(
                alert_id = alert.id,
                patient_id,
                priority = %alert.priority,
                current_value = record.current_value,
                "Alert triggered."
            );
            if let Err(e) =
                self.notifier.dispatch(alert.id, patient_id, &alert.name, alert.priority).await
            {
                tracing::error!(alert_id = alert.id, patient_id, error = %e, "Failed to dispatch alert notification.");
            }
        }

        self.tracker.commit(patient_id, &next);
        Ok(triggered.iter().map(|r| r.alert.id).collect())
    }

    /// Fresh evaluation of the patient's active alerts, stamped with the
    /// time each one was first seen active (or now if it has not been
    /// committed yet). Does not touch the tracker.
    pub async fn active_alerts(
        &self,
        patient_id: i64,
    ) -> Result<Vec<ActiveAlertRecord>, AlertManagerError> {
        let now = Utc::now();
        let mut records = self.evaluator.evaluate_all(patient_id).await?;
        for record in &mut records {
            record.triggered_at =
                Some(self.tracker.activated_at(patient_id, record.alert.id).unwrap_or(now));
        }
        records.sort_by_key(|r| r.alert.id);
        Ok(records)
    }
}
