//! This module contains the data models for the carewatch service.

pub mod active_alert;
pub mod alert;
pub mod check_in;
pub mod heart_rate;
pub mod notification;
pub mod preferences;
pub mod wearable_connection;

pub use active_alert::ActiveAlertRecord;
pub use alert::{Alert, AlertPriority, ComparisonOperator, MetricType, NewAlert};
pub use check_in::{CheckIn, CheckInStatus};
pub use heart_rate::{HeartRateReading, MAX_HEART_RATE_BPM, ReadingSource};
pub use notification::{DeviceToken, NotificationMessage, PushMessage};
pub use preferences::NotificationPreferences;
pub use wearable_connection::{RefreshedTokens, WearableConnection};
