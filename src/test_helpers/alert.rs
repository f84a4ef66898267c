//! A builder for creating `Alert` instances in tests.

use chrono::{DateTime, Utc};

use crate::models::{Alert, AlertPriority, ComparisonOperator, MetricType, NewAlert};

/// A builder for creating `Alert` and `NewAlert` instances in tests.
///
/// Defaults to an enabled, high priority wearable alert on `heart_rate > 100`.
pub struct AlertBuilder {
    id: i64,
    patient_id: i64,
    created_by: i64,
    name: Option<String>,
    metric_type: MetricType,
    metric_path: String,
    operator: ComparisonOperator,
    threshold_value: String,
    priority: AlertPriority,
    enabled: bool,
    created_at: Option<DateTime<Utc>>,
}

impl AlertBuilder {
    /// Creates a builder for an alert owned by `patient_id`.
    pub fn new(patient_id: i64) -> Self {
        Self {
            id: 1,
            patient_id,
            created_by: 1,
            name: None,
            metric_type: MetricType::Whoop,
            metric_path: "heart_rate".to_string(),
            operator: ComparisonOperator::GreaterThan,
            threshold_value: "100".to_string(),
            priority: AlertPriority::High,
            enabled: true,
            created_at: None,
        }
    }

    /// Sets the ID for the alert.
    pub fn id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Sets the name for the alert.
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Sets the user that created the alert.
    pub fn created_by(mut self, user_id: i64) -> Self {
        self.created_by = user_id;
        self
    }

    /// Makes this a wearable alert on `path`.
    pub fn whoop(mut self, path: &str) -> Self {
        self.metric_type = MetricType::Whoop;
        self.metric_path = path.to_string();
        self
    }

    /// Makes this a medication alert on `path`.
    pub fn medication(mut self, path: &str) -> Self {
        self.metric_type = MetricType::Medication;
        self.metric_path = path.to_string();
        self
    }

    /// Sets the operator from its symbol, e.g. `">="`.
    ///
    /// # Panics
    /// Panics on an unknown operator symbol.
    pub fn operator(mut self, operator: &str) -> Self {
        self.operator = operator.parse().expect("valid comparison operator");
        self
    }

    /// Sets the threshold text.
    pub fn threshold(mut self, threshold: &str) -> Self {
        self.threshold_value = threshold.to_string();
        self
    }

    /// Sets the priority tier.
    pub fn priority(mut self, priority: AlertPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets whether the alert is enabled.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the creation timestamp for the alert.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    fn resolved_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("Alert {}", self.id))
    }

    /// Builds the `Alert` instance.
    pub fn build(self) -> Alert {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        Alert {
            id: self.id,
            patient_id: self.patient_id,
            created_by: self.created_by,
            name: self.resolved_name(),
            metric_type: self.metric_type,
            metric_path: self.metric_path,
            operator: self.operator,
            threshold_value: self.threshold_value,
            priority: self.priority,
            enabled: self.enabled,
            created_at,
            updated_at: created_at,
        }
    }

    /// Builds a `NewAlert` for inserting through the repository. The ID is
    /// ignored.
    pub fn build_new(self) -> NewAlert {
        NewAlert {
            patient_id: self.patient_id,
            created_by: self.created_by,
            name: self.resolved_name(),
            metric_type: self.metric_type,
            metric_path: self.metric_path,
            operator: self.operator,
            threshold_value: self.threshold_value,
            priority: self.priority,
            enabled: self.enabled,
        }
    }
}
