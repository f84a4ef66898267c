//! A reusable, thread-safe pool for managing HTTP clients.
//!
//! This module provides a generic `HttpClientPool` that can be shared across the
//! application to create and reuse HTTP clients with different configurations.

use std::{collections::HashMap, sync::Arc};

use reqwest::Client as ReqwestClient;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tokio::sync::RwLock;

use super::client::create_retryable_http_client;
use crate::config::{BaseHttpClientConfig, HttpRetryConfig};

/// Errors that can occur within the `HttpClientPool`.
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// An error occurred while building the underlying `reqwest::Client`.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// A pool of retrying HTTP clients shared by the wearable client, the OAuth
/// refresher and the push transport.
///
/// Clients are keyed by their `HttpRetryConfig`, so services with different
/// retry strategies get isolated clients while services with the same
/// strategy share connections.
pub struct HttpClientPool {
    base_config: BaseHttpClientConfig,
    clients: Arc<RwLock<HashMap<String, Arc<ClientWithMiddleware>>>>,
}

impl HttpClientPool {
    /// Creates a new, empty `HttpClientPool` whose clients use `base_config`
    /// connection settings.
    pub fn new(base_config: BaseHttpClientConfig) -> Self {
        Self {
            base_config,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the client for `retry_policy`, creating it on first use.
    pub async fn get_or_create(
        &self,
        retry_policy: &HttpRetryConfig,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        let key = format!("{retry_policy:?}");

        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        // Another task may have created it while we waited for the write lock.
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let base_client = ReqwestClient::builder()
            .pool_max_idle_per_host(self.base_config.max_idle_per_host)
            .pool_idle_timeout(Some(self.base_config.idle_timeout))
            .connect_timeout(self.base_config.connect_timeout)
            .build()
            .map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;

        let new_client = Arc::new(create_retryable_http_client(retry_policy, base_client));
        clients.insert(key, new_client.clone());

        Ok(new_client)
    }

    /// Returns the number of active HTTP clients in the pool.
    #[cfg(test)]
    pub async fn get_active_client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new(BaseHttpClientConfig::default())
    }
}
