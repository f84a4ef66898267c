use std::{net::SocketAddr, sync::Arc};

use carewatch::{
    config::{AppConfig, ServerConfig},
    context::{AppMetrics, CareServices},
    http_client::HttpClientPool,
    http_server::{self, ApiState},
    persistence::{SqliteCareRepository, traits::CareRepository},
    test_helpers::memory_repository,
};
use reqwest::Client;
use tokio::task;
use tokio_util::sync::CancellationToken;

pub const API_KEY: &str = "test-key";

pub async fn create_test_repo() -> Arc<SqliteCareRepository> {
    Arc::new(memory_repository().await.expect("Failed to create in-memory repo"))
}

pub struct TestServer {
    pub address: SocketAddr,
    pub server_handle: task::JoinHandle<()>,
    pub client: Client,
    pub services: CareServices,
    token: CancellationToken,
}

impl TestServer {
    pub async fn new(repo: Arc<SqliteCareRepository>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");
        drop(listener); // Release port for the app to use

        let config = Arc::new(AppConfig {
            server: ServerConfig {
                enabled: true,
                listen_address: addr.to_string(),
                api_key: Some(API_KEY.to_string()),
            },
            ..Default::default()
        });

        let services = CareServices::build(
            &config,
            repo as Arc<dyn CareRepository>,
            &HttpClientPool::default(),
        )
        .await
        .expect("Failed to build services");

        let state = ApiState {
            config,
            services: services.clone(),
            app_metrics: AppMetrics::default(),
        };
        let token = CancellationToken::new();
        let server_token = token.clone();
        let server_handle = task::spawn(async move {
            http_server::run_server(state, server_token).await.expect("Server failed");
        });

        // Wait for server to start
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        Self { address: addr, server_handle, client: Client::new(), services, token }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(API_KEY)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn get_unauthenticated(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.expect("Failed to send request")
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(API_KEY)
            .json(&body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub fn cleanup(self) {
        self.token.cancel();
        self.server_handle.abort();
    }
}
