//! The Supervisor module manages the lifecycle of the Carewatch service.
//!
//! ## Responsibilities
//!
//! - **Initialization**: The `SupervisorBuilder` wires the care services
//!   over the configured repository.
//! - **Lifecycle Management**: The `Supervisor` starts the alert scheduler
//!   and, when enabled, the HTTP server.
//! - **Graceful Shutdown**: It listens for `SIGINT`/`SIGTERM`, stops the
//!   scheduler (letting in-flight passes finish) and closes the database
//!   within `shutdown_timeout`.
//! - **Task Supervision**: If a supervised task fails, every other service
//!   is shut down as well.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
use thiserror::Error;
use tokio::{signal, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    context::{AppContextError, AppMetrics, CareServices},
    engine::{AlertScheduler, TierRunner},
    http_server::{self, ApiState},
    persistence::{SqliteCareRepository, error::PersistenceError},
};

/// Represents the set of errors that can occur during the supervisor's
/// operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// A repository was not provided to the `SupervisorBuilder`.
    #[error("Missing care repository for Supervisor")]
    MissingRepository,

    /// The services could not be wired.
    #[error("Failed to initialize services: {0}")]
    Initialization(#[from] AppContextError),

    /// A storage operation failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// The primary runtime manager for the application.
pub struct Supervisor {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// The SQLite repository, flushed and closed on shutdown.
    repository: Arc<SqliteCareRepository>,

    /// The wired runtime services.
    services: CareServices,

    /// The tier scheduler.
    scheduler: AlertScheduler,

    /// The shared application metrics.
    app_metrics: AppMetrics,

    /// A token used to signal a graceful shutdown to all supervised tasks.
    cancellation_token: CancellationToken,

    /// A set of all spawned tasks that the supervisor is actively managing.
    join_set: JoinSet<()>,
}

impl Supervisor {
    /// Creates a new Supervisor instance with all its required components.
    pub fn new(
        config: AppConfig,
        repository: Arc<SqliteCareRepository>,
        services: CareServices,
        app_metrics: AppMetrics,
    ) -> Self {
        let scheduler = AlertScheduler::new(
            Arc::clone(&services.manager) as Arc<dyn TierRunner>,
            config.scheduler.clone(),
        );
        Self {
            config: Arc::new(config),
            repository,
            services,
            scheduler,
            app_metrics,
            cancellation_token: CancellationToken::new(),
            join_set: JoinSet::new(),
        }
    }

    /// Returns a new `SupervisorBuilder` instance.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// The wired services, e.g. for subscribing to live readings.
    pub fn services(&self) -> &CareServices {
        &self.services
    }

    /// A token that stops the supervisor when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Starts every service and blocks until shutdown completes.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let cancellation_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM handler")
                    .recv()
                    .await;
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = cancellation_token.cancelled() => {}
            }

            cancellation_token.cancel();
        });

        if self.config.server.enabled {
            let state = ApiState {
                config: Arc::clone(&self.config),
                services: self.services.clone(),
                app_metrics: self.app_metrics,
            };
            let http_cancellation_token = self.cancellation_token.clone();
            let failure_token = self.cancellation_token.clone();
            self.join_set.spawn(async move {
                if let Err(e) = http_server::run_server(state, http_cancellation_token).await {
                    tracing::error!(error = %e, "HTTP server failed. Initiating shutdown.");
                    failure_token.cancel();
                }
            });
        }

        self.scheduler.start().await;

        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(())) => {}
                        Some(Err(e)) => {
                            tracing::error!("A critical task failed: {:?}. Initiating shutdown.", e);
                            self.cancellation_token.cancel();
                        }
                        None => break,
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        tracing::info!("Starting graceful shutdown...");
        let shutdown_timeout = self.config.shutdown_timeout;
        let cleanup_logic = async {
            self.scheduler.stop().await;
            while self.join_set.join_next().await.is_some() {}
            tracing::info!("All supervised tasks have completed.");

            if let Err(e) = self.repository.flush().await {
                tracing::error!(error = %e, "Failed to flush pending writes, but continuing cleanup.");
            }
            self.repository.close().await;
        };

        if tokio::time::timeout(shutdown_timeout, cleanup_logic).await.is_err() {
            tracing::warn!(
                "Cleanup did not complete within the timeout of {:?}. Continuing shutdown.",
                shutdown_timeout
            );
        } else {
            tracing::info!("Cleanup completed successfully.");
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}
