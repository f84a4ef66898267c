use std::time::Duration;

use serde::Deserialize;

use super::{HttpRetryConfig, deserialize_duration_from_seconds};
use crate::models::alert::AlertPriority;

fn default_cooldown() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_title_template() -> String {
    "Varning: {{ alert_name }}".to_string()
}

fn default_body_template() -> String {
    "{{ priority_label }} - Varningen har aktiverats".to_string()
}

/// Human-readable label per priority tier, substituted into the templates as
/// `priority_label`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PriorityLabels {
    /// Label for `high` priority alerts.
    pub high: String,
    /// Label for `mid` priority alerts.
    pub mid: String,
    /// Label for `low` priority alerts.
    pub low: String,
}

impl Default for PriorityLabels {
    fn default() -> Self {
        Self {
            high: "Hög prioritet".to_string(),
            mid: "Medel prioritet".to_string(),
            low: "Låg prioritet".to_string(),
        }
    }
}

impl PriorityLabels {
    /// Returns the label for the given tier.
    pub fn label(&self, priority: AlertPriority) -> &str {
        match priority {
            AlertPriority::High => &self.high,
            AlertPriority::Mid => &self.mid,
            AlertPriority::Low => &self.low,
        }
    }
}

/// Settings for alert notification dispatch and the push gateway.
#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Minimum time between two dispatches for the same alert.
    #[serde(default = "default_cooldown", deserialize_with = "deserialize_duration_from_seconds")]
    pub cooldown_secs: Duration,

    /// Push gateway endpoint. Push delivery is disabled when unset.
    #[serde(default)]
    pub push_gateway_url: Option<String>,

    /// Optional secret used to HMAC-sign gateway requests.
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// minijinja template for the notification title.
    #[serde(default = "default_title_template")]
    pub title_template: String,

    /// minijinja template for the notification body.
    #[serde(default = "default_body_template")]
    pub body_template: String,

    /// Labels substituted as `priority_label`.
    #[serde(default)]
    pub priority_labels: PriorityLabels,

    /// Retry policy for push gateway calls.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown(),
            push_gateway_url: None,
            signing_secret: None,
            title_template: default_title_template(),
            body_template: default_body_template(),
            priority_labels: PriorityLabels::default(),
            retry_policy: HttpRetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_labels_default_to_swedish() {
        let labels = PriorityLabels::default();
        assert_eq!(labels.label(AlertPriority::High), "Hög prioritet");
        assert_eq!(labels.label(AlertPriority::Mid), "Medel prioritet");
        assert_eq!(labels.label(AlertPriority::Low), "Låg prioritet");
    }

    #[test]
    fn test_notification_config_custom_labels() {
        let yaml = r#"
          cooldown_secs: 60
          title_template: "Alert: {{ alert_name }}"
          priority_labels:
            high: "High priority"
            mid: "Medium priority"
            low: "Low priority"
        "#;
        let config = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<NotificationConfig>()
            .unwrap();
        assert_eq!(config.cooldown_secs, Duration::from_secs(60));
        assert_eq!(config.title_template, "Alert: {{ alert_name }}");
        assert_eq!(config.priority_labels.label(AlertPriority::Mid), "Medium priority");
        assert!(config.push_gateway_url.is_none());
    }
}
