//! Ferry Orchestrator
//!
//! HTTP front end of the release engine. Accepts pipeline definitions,
//! launches runs, exposes their reports, logs and artifacts, and resolves
//! approval gates. Runs are kept in memory; artifacts and release manifests
//! are written under the configured artifact directory.

use anyhow::{Context, Result};
use ferry_runner::PipelineEngine;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod repository;
pub mod service;

use crate::api::AppState;
use crate::config::OrchestratorConfig;
use crate::service::run_service;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ferry_orchestrator=debug,ferry_runner=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Ferry Orchestrator...");

    let config = OrchestratorConfig::from_env()?;
    tracing::info!(
        "Worker pool: {} slot(s), artifacts in {}",
        config.runner.max_parallel_tasks,
        config.runner.artifact_dir.display()
    );

    let secrets = config.load_secrets()?;
    let scopes: Vec<_> = secrets.scopes().collect();
    tracing::info!("Secret scopes loaded: {:?}", scopes);

    let grace = config.runner.kill_grace * 2;
    let engine = PipelineEngine::with_process_executor(config.runner.clone(), secrets);
    let state = AppState::new(engine, config.run_retention);

    // Build router with all API endpoints
    let app = api::create_router(state.clone());

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    run_service::abort_all(&state.runs, grace).await;
    tracing::info!("Orchestrator stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
