//! # Notification Dispatcher
//!
//! Turns a newly-triggered alert into push notifications for every person
//! linked to the patient.
//!
//! ## Workflow
//!
//! 1. `dispatch` first consults the per-alert cooldown record. An alert that
//!    was successfully delivered within the cooldown window is skipped with no
//!    side effects.
//! 2. The alert is re-read from storage; a deleted alert aborts the dispatch.
//! 3. Recipients are the patient's linked users. Each user's preferences are
//!    checked against the alert priority.
//! 4. Title and body are rendered from the configured templates and one push
//!    per registered device token is handed to the `PushTransport`.
//! 5. The cooldown timestamp is recorded only when at least one push was
//!    delivered. A recipient whose preferences or tokens cannot be loaded is
//!    logged and skipped, so earlier deliveries still start the cooldown.

use std::{collections::BTreeMap, sync::Arc};

use dashmap::DashMap;
use serde_json::json;
use tokio::time::Instant;

use crate::{
    config::NotificationConfig,
    http_client::HttpClientPool,
    models::{AlertPriority, NotificationMessage, PushMessage},
    persistence::traits::CareRepository,
};

pub mod error;
pub mod payload_builder;
pub mod push;
pub mod template;

pub use error::NotificationError;
pub use push::{DisabledPushTransport, HttpPushTransport, PushTransport};
use template::TemplateService;

/// What a call to [`NotificationService::dispatch`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A notification for this alert was delivered within the cooldown
    /// window.
    CoolingDown,
    /// The alert no longer exists.
    AlertNotFound,
    /// The patient has no linked users.
    NoRecipients,
    /// Pushes were attempted; `sent + failed` may be zero when every
    /// recipient opted out or has no device.
    Delivered {
        /// Pushes the transport accepted.
        sent: usize,
        /// Pushes the transport rejected.
        failed: usize,
    },
}

/// Sends alert notifications, gated by a per-alert cooldown.
pub struct NotificationService {
    repository: Arc<dyn CareRepository>,
    transport: Arc<dyn PushTransport>,
    templates: TemplateService,
    config: NotificationConfig,
    /// Alert ID -> time of the last dispatch that delivered at least one push.
    cooldowns: DashMap<i64, Instant>,
}

impl NotificationService {
    /// Creates a service delivering through `transport`.
    pub fn new(
        repository: Arc<dyn CareRepository>,
        transport: Arc<dyn PushTransport>,
        config: NotificationConfig,
    ) -> Self {
        Self {
            repository,
            transport,
            templates: TemplateService::new(),
            config,
            cooldowns: DashMap::new(),
        }
    }

    /// Builds the service with an HTTP push transport when a gateway URL is
    /// configured, and a disabled transport otherwise.
    pub async fn from_config(
        config: NotificationConfig,
        repository: Arc<dyn CareRepository>,
        client_pool: &HttpClientPool,
    ) -> Result<Self, NotificationError> {
        let transport: Arc<dyn PushTransport> = match &config.push_gateway_url {
            Some(url) => {
                url::Url::parse(url).map_err(|e| {
                    NotificationError::ConfigError(format!("Invalid push gateway URL {url}: {e}"))
                })?;
                let client = client_pool.get_or_create(&config.retry_policy).await?;
                Arc::new(HttpPushTransport::new(
                    url.clone(),
                    client,
                    config.signing_secret.clone(),
                    Arc::clone(&repository),
                ))
            }
            None => {
                tracing::warn!("No push gateway URL configured, push notifications disabled.");
                Arc::new(DisabledPushTransport)
            }
        };
        Ok(Self::new(repository, transport, config))
    }

    /// Whether `alert_id` is still inside its cooldown window.
    pub fn is_cooling_down(&self, alert_id: i64) -> bool {
        self.cooldowns
            .get(&alert_id)
            .is_some_and(|sent_at| sent_at.elapsed() < self.config.cooldown_secs)
    }

    fn render(
        &self,
        alert_name: &str,
        priority: AlertPriority,
    ) -> Result<NotificationMessage, NotificationError> {
        let context = json!({
            "alert_name": alert_name,
            "priority": priority.as_str(),
            "priority_label": self.config.priority_labels.label(priority),
        });
        Ok(NotificationMessage {
            title: self.templates.render(&self.config.title_template, context.clone())?,
            body: self.templates.render(&self.config.body_template, context)?,
        })
    }

    /// Notifies everyone linked to `patient_id` that `alert_id` triggered.
    #[tracing::instrument(skip(self, alert_name), level = "debug")]
    pub async fn dispatch(
        &self,
        alert_id: i64,
        patient_id: i64,
        alert_name: &str,
        priority: AlertPriority,
    ) -> Result<DispatchOutcome, NotificationError> {
        if self.is_cooling_down(alert_id) {
            tracing::debug!(alert_id, "Alert in cooldown, skipping notification.");
            return Ok(DispatchOutcome::CoolingDown);
        }

        if self.repository.get_alert_by_id(alert_id).await?.is_none() {
            tracing::error!(alert_id, "Alert not found, skipping notification.");
            return Ok(DispatchOutcome::AlertNotFound);
        }

        let recipients = self.repository.get_patient_users(patient_id).await?;
        if recipients.is_empty() {
            tracing::info!(patient_id, "No recipients found for patient.");
            return Ok(DispatchOutcome::NoRecipients);
        }

        let message = self.render(alert_name, priority)?;
        let data = BTreeMap::from([
            ("type".to_string(), "alert".to_string()),
            ("alertId".to_string(), alert_id.to_string()),
            ("patientId".to_string(), patient_id.to_string()),
            ("priority".to_string(), priority.as_str().to_string()),
        ]);

        let mut sent = 0;
        let mut failed = 0;
        for user_id in recipients {
            let preferences = match self.repository.get_notification_preferences(user_id).await {
                Ok(preferences) => preferences,
                Err(e) => {
                    tracing::error!(
                        alert_id,
                        user_id,
                        error = %e,
                        "Failed to load notification preferences, skipping recipient."
                    );
                    continue;
                }
            };
            if !preferences.allows(priority) {
                tracing::debug!(user_id, %priority, "Recipient opted out of this priority.");
                continue;
            }

            let devices = match self.repository.get_device_tokens(user_id).await {
                Ok(devices) => devices,
                Err(e) => {
                    tracing::error!(
                        alert_id,
                        user_id,
                        error = %e,
                        "Failed to load device tokens, skipping recipient."
                    );
                    continue;
                }
            };
            for device in devices {
                let push = PushMessage {
                    token: device.token,
                    message: message.clone(),
                    data: data.clone(),
                };
                if self.transport.send(&push).await {
                    sent += 1;
                } else {
                    failed += 1;
                }
            }
        }

        if sent > 0 {
            self.cooldowns.insert(alert_id, Instant::now());
        }
        tracing::info!(alert_id, patient_id, sent, failed, "Alert notification dispatched.");

        Ok(DispatchOutcome::Delivered { sent, failed })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        models::{DeviceToken, NotificationPreferences},
        notification::push::MockPushTransport,
        persistence::{error::PersistenceError, traits::MockCareRepository},
        test_helpers::AlertBuilder,
    };

    fn device(user_id: i64, token: &str) -> DeviceToken {
        DeviceToken { user_id, token: token.to_string(), platform: Some("android".into()) }
    }

    /// Patient 1 has two users; user 10 has two devices, user 11 has one.
    fn repository() -> MockCareRepository {
        let mut repo = MockCareRepository::new();
        repo.expect_get_alert_by_id()
            .returning(|id| Ok(Some(AlertBuilder::new(1).id(id).build())));
        repo.expect_get_patient_users().returning(|_| Ok(vec![10, 11]));
        repo.expect_get_device_tokens().returning(|user_id| {
            Ok(match user_id {
                10 => vec![device(10, "a"), device(10, "b")],
                _ => vec![device(11, "c")],
            })
        });
        repo
    }

    fn service(repo: MockCareRepository, transport: MockPushTransport) -> NotificationService {
        NotificationService::new(Arc::new(repo), Arc::new(transport), NotificationConfig::default())
    }

    #[tokio::test]
    async fn test_dispatch_fans_out_to_every_device() {
        let mut repo = repository();
        repo.expect_get_notification_preferences()
            .returning(|_| Ok(NotificationPreferences::default()));

        let mut transport = MockPushTransport::new();
        transport
            .expect_send()
            .withf(|push| {
                push.message.title == "Varning: Hög puls"
                    && push.message.body == "Hög prioritet - Varningen har aktiverats"
                    && push.data["type"] == "alert"
                    && push.data["alertId"] == "5"
                    && push.data["patientId"] == "1"
                    && push.data["priority"] == "high"
            })
            .times(3)
            .returning(|_| true);

        let service = service(repo, transport);
        let outcome = service.dispatch(5, 1, "Hög puls", AlertPriority::High).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Delivered { sent: 3, failed: 0 });
        assert!(service.is_cooling_down(5));
    }

    #[tokio::test]
    async fn test_preferences_filter_recipients() {
        let mut repo = repository();
        repo.expect_get_notification_preferences().returning(|user_id| {
            Ok(if user_id == 10 {
                NotificationPreferences { mid_priority_enabled: false, ..Default::default() }
            } else {
                NotificationPreferences::default()
            })
        });

        let mut transport = MockPushTransport::new();
        transport.expect_send().withf(|push| push.token == "c").times(1).returning(|_| true);

        let service = service(repo, transport);
        let outcome = service.dispatch(5, 1, "Medicin", AlertPriority::Mid).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered { sent: 1, failed: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_suppresses_repeat_dispatch() {
        let mut repo = repository();
        repo.expect_get_notification_preferences()
            .returning(|_| Ok(NotificationPreferences::default()));
        let mut transport = MockPushTransport::new();
        transport.expect_send().times(6).returning(|_| true);

        let service = service(repo, transport);
        service.dispatch(5, 1, "Puls", AlertPriority::High).await.unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;
        let outcome = service.dispatch(5, 1, "Puls", AlertPriority::High).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::CoolingDown);

        tokio::time::advance(Duration::from_secs(181)).await;
        let outcome = service.dispatch(5, 1, "Puls", AlertPriority::High).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered { sent: 3, failed: 0 });
    }

    #[tokio::test]
    async fn test_failed_deliveries_do_not_start_cooldown() {
        let mut repo = repository();
        repo.expect_get_notification_preferences()
            .returning(|_| Ok(NotificationPreferences::default()));
        let mut transport = MockPushTransport::new();
        transport.expect_send().returning(|_| false);

        let service = service(repo, transport);
        let outcome = service.dispatch(5, 1, "Puls", AlertPriority::Low).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Delivered { sent: 0, failed: 3 });
        assert!(!service.is_cooling_down(5));
    }

    #[tokio::test]
    async fn test_recipient_lookup_failure_still_starts_cooldown() {
        let mut repo = repository();
        repo.expect_get_notification_preferences().returning(|user_id| {
            if user_id == 11 {
                Err(PersistenceError::OperationFailed("database is locked".into()))
            } else {
                Ok(NotificationPreferences::default())
            }
        });
        let mut transport = MockPushTransport::new();
        transport.expect_send().withf(|push| push.token != "c").times(2).returning(|_| true);

        let service = service(repo, transport);
        let outcome = service.dispatch(5, 1, "Puls", AlertPriority::High).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered { sent: 2, failed: 0 });
        assert!(service.is_cooling_down(5));

        let outcome = service.dispatch(5, 1, "Puls", AlertPriority::High).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::CoolingDown);
    }

    #[tokio::test]
    async fn test_device_token_failure_skips_only_that_recipient() {
        let mut repo = MockCareRepository::new();
        repo.expect_get_alert_by_id()
            .returning(|id| Ok(Some(AlertBuilder::new(1).id(id).build())));
        repo.expect_get_patient_users().returning(|_| Ok(vec![10, 11]));
        repo.expect_get_notification_preferences()
            .returning(|_| Ok(NotificationPreferences::default()));
        repo.expect_get_device_tokens().returning(|user_id| {
            if user_id == 10 {
                Err(PersistenceError::OperationFailed("disk I/O error".into()))
            } else {
                Ok(vec![device(11, "c")])
            }
        });
        let mut transport = MockPushTransport::new();
        transport.expect_send().withf(|push| push.token == "c").times(1).returning(|_| true);

        let service = service(repo, transport);
        let outcome = service.dispatch(5, 1, "Puls", AlertPriority::Mid).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Delivered { sent: 1, failed: 0 });
        assert!(service.is_cooling_down(5));
    }

    #[tokio::test]
    async fn test_missing_alert_aborts() {
        let mut repo = MockCareRepository::new();
        repo.expect_get_alert_by_id().returning(|_| Ok(None));
        repo.expect_get_patient_users().never();
        let mut transport = MockPushTransport::new();
        transport.expect_send().never();

        let service = service(repo, transport);
        let outcome = service.dispatch(9, 1, "Puls", AlertPriority::High).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::AlertNotFound);
    }

    #[tokio::test]
    async fn test_no_recipients() {
        let mut repo = MockCareRepository::new();
        repo.expect_get_alert_by_id()
            .returning(|id| Ok(Some(AlertBuilder::new(1).id(id).build())));
        repo.expect_get_patient_users().returning(|_| Ok(vec![]));
        let mut transport = MockPushTransport::new();
        transport.expect_send().never();

        let service = service(repo, transport);
        let outcome = service.dispatch(9, 1, "Puls", AlertPriority::High).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NoRecipients);
        assert!(!service.is_cooling_down(9));
    }
}
