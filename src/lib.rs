//! Grading core for scanned answer sheets: template registry, job dispatch,
//! sheet lifecycle, AI-backed region scoring, confidence-based review routing,
//! training orchestration, and report generation.

pub mod core;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod registry;
pub mod schemas;
pub mod services;
pub mod store;
pub mod tasks;

pub use error::Error;

use std::sync::Arc;

use crate::core::config::Settings;
use crate::core::state::AppState;
use crate::dispatch::JobDispatcher;
use crate::services::notify::LogNotifier;
use crate::services::scoring::MlScoringClient;

/// Boots the worker: configuration, telemetry, dispatcher, handlers. Runs
/// until a shutdown signal arrives, then drains the queues.
pub async fn run_worker() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    core::telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let dispatcher = JobDispatcher::start(settings.dispatch());
    let ml_client = Arc::new(MlScoringClient::from_settings(&settings)?);
    let state = AppState::new(
        settings,
        dispatcher.clone(),
        ml_client.clone(),
        ml_client,
        Arc::new(LogNotifier),
    );
    tasks::register_handlers(&state).await;

    tracing::info!(
        environment = state.settings().runtime().environment.as_str(),
        workers_per_queue = state.settings().dispatch().workers_per_queue,
        "Grading worker started"
    );

    core::shutdown::shutdown_signal().await;
    tracing::info!("Shutdown signal received; draining job queues");
    dispatcher.shutdown().await;
    Ok(())
}
