//! `carewatch evaluate`: evaluates one patient's alerts and prints the
//! active ones as JSON. Nothing is committed and no notification is sent.

use std::sync::Arc;

use clap::Parser;
use thiserror::Error;

use crate::{
    context::{AppContextBuilder, AppContextError, CareServices},
    engine::AlertManagerError,
    persistence::traits::CareRepository,
};

/// Errors from the `evaluate` command.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration, database or service wiring failed.
    #[error("Initialization error: {0}")]
    Context(#[from] AppContextError),
    /// The patient's alerts could not be evaluated.
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] AlertManagerError),
    /// The result could not be serialized.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Evaluates one patient's alerts and prints the active ones.
#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    /// The patient whose alerts are evaluated.
    #[arg(short, long)]
    pub patient_id: i64,
    /// Overrides the configured database URL.
    #[arg(long)]
    pub database_url: Option<String>,
}

/// Renders the patient's currently active alerts as pretty JSON.
pub async fn render_active_alerts(services: &CareServices, patient_id: i64) -> Result<String, Error> {
    let alerts = services.manager.active_alerts(patient_id).await?;
    tracing::info!(patient_id, active = alerts.len(), "Evaluation finished.");
    Ok(serde_json::to_string_pretty(&alerts)?)
}

/// Runs the command against the configured database.
pub async fn execute(args: EvaluateArgs, config_dir: Option<String>) -> Result<(), Error> {
    let mut builder = AppContextBuilder::new(config_dir);
    if let Some(url) = args.database_url {
        builder = builder.database_url(url);
    }
    let context = builder.build().await?;

    let services = CareServices::build(
        &context.config,
        Arc::clone(&context.repo) as Arc<dyn CareRepository>,
        &context.client_pool,
    )
    .await?;

    let output = render_active_alerts(&services, args.patient_id).await;
    context.repo.close().await;
    println!("{}", output?);
    Ok(())
}
