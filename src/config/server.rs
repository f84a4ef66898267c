use serde::Deserialize;

/// Configuration for the REST API server.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Whether the HTTP server is started by the supervisor.
    #[serde(default)]
    pub enabled: bool,

    /// Address and port for the HTTP server to listen on.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Optional bearer token required on every route except `/health`.
    /// If not set in config, falls back to the `CAREWATCH_API_KEY` env var.
    #[serde(default = "default_api_key_from_env")]
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { enabled: false, listen_address: default_listen_address(), api_key: None }
    }
}

fn default_listen_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_api_key_from_env() -> Option<String> {
    std::env::var("CAREWATCH_API_KEY").ok()
}
