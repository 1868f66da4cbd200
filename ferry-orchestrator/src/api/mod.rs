//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod approval;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod run;

use axum::{
    Router,
    routing::{get, post},
};
use ferry_runner::PipelineEngine;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::repository::RunRepository;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PipelineEngine>,
    pub runs: Arc<RunRepository>,
}

impl AppState {
    pub fn new(engine: PipelineEngine, run_retention: Duration) -> Self {
        Self {
            engine: Arc::new(engine),
            runs: Arc::new(RunRepository::with_retention(run_retention)),
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route("/api/pipeline/validate", post(pipeline::validate_pipeline))
        // Run endpoints
        .route("/api/runs", post(run::launch_run).get(run::list_runs))
        .route("/api/runs/{id}", get(run::get_run))
        .route("/api/runs/{id}/abort", post(run::abort_run))
        .route("/api/runs/{id}/artifacts", get(run::get_artifacts))
        .route("/api/runs/{id}/tasks/{task}/logs", get(run::get_task_logs))
        // Approval endpoints
        .route("/api/approvals", get(approval::list_pending))
        .route(
            "/api/runs/{id}/stages/{stage}/approve",
            post(approval::approve_stage),
        )
        .route(
            "/api/runs/{id}/stages/{stage}/reject",
            post(approval::reject_stage),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
