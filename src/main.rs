//! Health Risk Predictor - Main Entry Point
//!
//! Loads the trained model once, then serves the prediction form over HTTP.

use anyhow::{Context, Result};
use health_risk_predictor::{
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, PredictionMetrics},
    models::loader::ModelLoader,
    pipeline::PredictionPipeline,
    server::{create_router, AppState, SessionSweeper},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    init_logging(&config.logging)?;

    info!("Starting Health Risk Predictor");
    info!(
        manifest = %config.models.manifest_path.display(),
        bind = %config.server.bind_address(),
        timeout_ms = config.inference.timeout_ms,
        "Configuration loaded successfully"
    );

    // Load the model once; there is no fallback model
    let loader = ModelLoader::from_config(&config.models);
    let model = loader.load().context("Failed to load model artifact")?;
    let pipeline = PredictionPipeline::new(model);
    info!(
        model = %pipeline.model_name(),
        features = ?pipeline.schema().names(),
        target = %pipeline.target(),
        "Prediction pipeline initialized"
    );

    let metrics = Arc::new(PredictionMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = AppState::new(pipeline, &config, metrics.clone());
    if config.server.session_idle_secs > 0 {
        let idle = Duration::from_secs(config.server.session_idle_secs);
        tokio::spawn(SessionSweeper::new(state.sessions.clone(), idle).start());
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address()))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Print final summary
    info!("Server shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "health_risk_predictor={level},tower_http={level}",
            level = config.level
        ))
    })?;

    match config.format.as_str() {
        "json" => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}
