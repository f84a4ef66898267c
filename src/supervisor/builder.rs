//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use super::{Supervisor, SupervisorError};
use crate::{
    config::AppConfig,
    context::{AppMetrics, CareServices},
    http_client::HttpClientPool,
    persistence::{SqliteCareRepository, traits::CareRepository},
};

/// A builder for creating a `Supervisor` instance.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    repository: Option<Arc<SqliteCareRepository>>,
    client_pool: Option<Arc<HttpClientPool>>,
    app_metrics: Option<AppMetrics>,
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the migrated repository for the `Supervisor`.
    pub fn repository(mut self, repository: Arc<SqliteCareRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Shares an existing HTTP client pool. A new pool is created otherwise.
    pub fn client_pool(mut self, client_pool: Arc<HttpClientPool>) -> Self {
        self.client_pool = Some(client_pool);
        self
    }

    /// Sets the application metrics. Defaults to metrics starting now.
    pub fn app_metrics(mut self, app_metrics: AppMetrics) -> Self {
        self.app_metrics = Some(app_metrics);
        self
    }

    /// Validates the inputs and wires the services.
    pub async fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let repository = self.repository.ok_or(SupervisorError::MissingRepository)?;
        let client_pool = self
            .client_pool
            .unwrap_or_else(|| Arc::new(HttpClientPool::new(config.http_base_config.clone())));

        let services = CareServices::build(
            &config,
            Arc::clone(&repository) as Arc<dyn CareRepository>,
            &client_pool,
        )
        .await?;

        Ok(Supervisor::new(config, repository, services, self.app_metrics.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::memory_repository;

    #[tokio::test]
    async fn build_succeeds_with_config_and_repository() {
        let repository = Arc::new(memory_repository().await.unwrap());
        let result =
            SupervisorBuilder::new().config(AppConfig::default()).repository(repository).build().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn build_fails_if_config_is_missing() {
        let repository = Arc::new(memory_repository().await.unwrap());
        let result = SupervisorBuilder::new().repository(repository).build().await;
        assert!(matches!(result, Err(SupervisorError::MissingConfig)));
    }

    #[tokio::test]
    async fn build_fails_if_repository_is_missing() {
        let result = SupervisorBuilder::new().config(AppConfig::default()).build().await;
        assert!(matches!(result, Err(SupervisorError::MissingRepository)));
    }

    #[tokio::test]
    async fn run_stops_when_cancelled() {
        let repository = Arc::new(memory_repository().await.unwrap());
        let supervisor = SupervisorBuilder::new()
            .config(AppConfig::default())
            .repository(repository)
            .build()
            .await
            .unwrap();

        let token = supervisor.cancellation_token();
        let handle = tokio::spawn(supervisor.run());
        token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
