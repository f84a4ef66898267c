//! Application context and initialization logic.
//!
//! `AppContextBuilder` loads the configuration and opens the database.
//! `CareServices` wires the wearable gateway, evaluator, state tracker,
//! dispatcher, alert manager and live-reading handler on top of a
//! repository. Both the supervisor and the one-shot CLI commands build on
//! these.

mod error;
mod metrics;

use std::sync::Arc;

pub use error::AppContextError;
pub use metrics::AppMetrics;

use crate::{
    config::AppConfig,
    engine::{AlertEvaluator, AlertManager, AlertStateTracker, WearableMetricResolver},
    http_client::HttpClientPool,
    live::LiveReadingHandler,
    notification::NotificationService,
    persistence::{SqliteCareRepository, traits::CareRepository},
    wearable::{HttpWearableApi, RateLimiter, RepositoryTokenProvider, WearableGateway},
};

/// Configuration, database and shared HTTP clients.
pub struct AppContext {
    /// Shared application configuration.
    pub config: AppConfig,

    /// The SQLite repository.
    pub repo: Arc<SqliteCareRepository>,

    /// Pool of outbound HTTP clients.
    pub client_pool: Arc<HttpClientPool>,
}

/// A builder for the `AppContext`, allowing configuration overrides.
#[derive(Default)]
pub struct AppContextBuilder {
    /// Optional configuration directory to load settings from.
    config_dir: Option<String>,

    /// Optional override for the database URL.
    database_url_override: Option<String>,
}

impl AppContextBuilder {
    /// Creates a new `AppContextBuilder` reading from `config_dir`
    /// (`configs/` when unset).
    pub fn new(config_dir: Option<String>) -> Self {
        Self { config_dir, database_url_override: None }
    }

    /// Sets a database URL override.
    pub fn database_url(mut self, url: String) -> Self {
        self.database_url_override = Some(url);
        self
    }

    /// Loads configuration, connects to the database and runs migrations.
    pub async fn build(self) -> Result<AppContext, AppContextError> {
        tracing::debug!("Loading application configuration...");
        let mut config = AppConfig::new(self.config_dir.as_deref())?;
        if let Some(db_url) = self.database_url_override {
            tracing::info!(database_url = %db_url, "Overriding database URL.");
            config.database_url = db_url;
        }
        tracing::debug!(database_url = %config.database_url, "Configuration loaded.");

        tracing::debug!("Initializing care repository...");
        let repo = Arc::new(SqliteCareRepository::new(&config.database_url).await?);
        repo.run_migrations().await?;
        tracing::info!("Database migrations completed.");

        let client_pool = Arc::new(HttpClientPool::new(config.http_base_config.clone()));

        Ok(AppContext { config, repo, client_pool })
    }
}

/// The wired runtime services.
#[derive(Clone)]
pub struct CareServices {
    /// Vendor quota shared by every evaluation.
    pub rate_limiter: Arc<RateLimiter>,
    /// Cached, rate-limited access to the wearable API.
    pub gateway: Arc<WearableGateway>,
    /// Threshold evaluation.
    pub evaluator: Arc<AlertEvaluator>,
    /// Active-alert memory.
    pub tracker: Arc<AlertStateTracker>,
    /// Push fan-out with cooldown.
    pub notifier: Arc<NotificationService>,
    /// Tier and live evaluation passes.
    pub manager: Arc<AlertManager>,
    /// Live heart-rate ingestion.
    pub live: Arc<LiveReadingHandler>,
}

impl CareServices {
    /// Wires every service over `repository`, using HTTP clients from
    /// `client_pool`.
    pub async fn build(
        config: &AppConfig,
        repository: Arc<dyn CareRepository>,
        client_pool: &HttpClientPool,
    ) -> Result<Self, AppContextError> {
        let wearable_client = client_pool.get_or_create(&config.wearable.retry_policy).await?;
        let api = Arc::new(HttpWearableApi::new(
            &config.wearable.api_base_url,
            Arc::clone(&wearable_client),
        )?);

        let rate_limiter = Arc::new(RateLimiter::from_config(&config.wearable));
        let gateway =
            Arc::new(WearableGateway::new(api, Arc::clone(&rate_limiter), &config.wearable));
        let tokens = Arc::new(RepositoryTokenProvider::new(
            Arc::clone(&repository),
            wearable_client,
            &config.wearable,
        ));
        let resolver = Arc::new(WearableMetricResolver::new(
            Arc::clone(&repository),
            Arc::clone(&gateway),
            tokens,
            &config.wearable,
        ));

        let evaluator = Arc::new(AlertEvaluator::new(Arc::clone(&repository), resolver));
        let tracker = Arc::new(AlertStateTracker::new());
        let notifier = Arc::new(
            NotificationService::from_config(
                config.notifications.clone(),
                Arc::clone(&repository),
                client_pool,
            )
            .await?,
        );
        let manager = Arc::new(AlertManager::new(
            Arc::clone(&repository),
            Arc::clone(&evaluator),
            Arc::clone(&tracker),
            Arc::clone(&notifier),
        ));
        let live = Arc::new(LiveReadingHandler::new(
            repository,
            Arc::clone(&gateway),
            Arc::clone(&manager),
            config.live_channel_capacity,
        ));

        tracing::info!(
            requests_per_minute = config.wearable.requests_per_minute,
            requests_per_day = config.wearable.requests_per_day,
            push_enabled = config.notifications.push_gateway_url.is_some(),
            "Care services initialized."
        );

        Ok(Self { rate_limiter, gateway, evaluator, tracker, notifier, manager, live })
    }
}
