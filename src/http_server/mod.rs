//! HTTP server module
//!
//! A thin JSON surface over the running services: health and status,
//! a fresh view of a patient's active alerts and live heart-rate ingestion.

mod alerts;
mod auth;
mod error;
mod heart_rate;
mod status;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
pub use error::ApiError;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    context::{AppMetrics, CareServices},
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    /// Shared application configuration.
    pub config: Arc<AppConfig>,
    /// The running services.
    pub services: CareServices,
    /// Process metrics.
    pub app_metrics: AppMetrics,
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Builds the router. Every route except `/health` requires the configured
/// bearer token, if one is set.
pub fn build_router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/status", get(status::status))
        .route("/patients/{patient_id}/alerts/active", get(alerts::get_active_alerts))
        .route("/patients/{patient_id}/heart-rate", post(heart_rate::post_heart_rate))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::auth));

    Router::new().route("/health", get(health)).merge(protected).with_state(state)
}

/// Serves the API on `server.listen_address` until `cancellation_token` is
/// cancelled.
pub async fn run_server(
    state: ApiState,
    cancellation_token: CancellationToken,
) -> Result<(), std::io::Error> {
    let addr: SocketAddr = state.config.server.listen_address.parse().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Invalid server.listen_address: {e}"),
        )
    })?;
    if state.config.server.api_key.is_none() {
        tracing::warn!("No API key configured, HTTP routes are unauthenticated.");
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening.");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(cancellation_token.cancelled_owned())
        .await
}
