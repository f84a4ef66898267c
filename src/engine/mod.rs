//! The evaluation engine: resolves metrics, compares them against alert
//! thresholds, tracks which alerts are active and schedules the periodic
//! passes that drive notifications.

pub mod alert_manager;
pub mod evaluator;
pub mod metric_path;
pub mod metric_resolver;
pub mod scheduler;
pub mod state_tracker;

pub use alert_manager::{AlertManager, AlertManagerError, PassScope, TierReport};
pub use evaluator::{AlertEvaluator, EvaluatorError, PatientEvaluation, compare_values};
pub use metric_resolver::{MetricResolution, MetricSource, WearableMetricResolver};
pub use scheduler::{AlertScheduler, TierRunner};
pub use state_tracker::AlertStateTracker;
