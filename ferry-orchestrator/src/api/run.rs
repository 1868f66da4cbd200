//! Run API Handlers
//!
//! HTTP endpoints for run lifecycle management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use ferry_core::domain::artifact::Artifact;
use ferry_core::domain::run::RunReport;
use ferry_core::dto::log::TaskLogs;
use ferry_core::dto::run::{LaunchRun, RunLaunched, RunSummary};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::run_service;

// =============================================================================
// Run Lifecycle Endpoints
// =============================================================================

/// POST /api/runs
/// Launch a run of a definition for a version
pub async fn launch_run(
    State(state): State<AppState>,
    Json(req): Json<LaunchRun>,
) -> ApiResult<(StatusCode, Json<RunLaunched>)> {
    tracing::info!("Launching run for version {}", req.version);

    let launched = run_service::launch_run(&state.engine, &state.runs, req).await?;

    Ok((StatusCode::CREATED, Json(launched)))
}

/// GET /api/runs
/// List all runs
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunSummary>> {
    tracing::debug!("Listing all runs");

    Json(run_service::list_runs(&state.runs).await)
}

/// GET /api/runs/{id}
/// Get the full report of a run
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RunReport>> {
    tracing::debug!("Getting run: {}", id);

    let report = run_service::get_run(&state.runs, id).await?;

    Ok(Json(report))
}

/// POST /api/runs/{id}/abort
/// Cancel a run
pub async fn abort_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Aborting run: {}", id);

    run_service::abort_run(&state.runs, id).await?;

    Ok(StatusCode::ACCEPTED)
}

// =============================================================================
// Run Output Endpoints
// =============================================================================

/// GET /api/runs/{id}/artifacts
/// List the artifacts of a run
pub async fn get_artifacts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Artifact>>> {
    tracing::debug!("Getting artifacts of run: {}", id);

    let artifacts = run_service::get_artifacts(&state.runs, id).await?;

    Ok(Json(artifacts))
}

/// GET /api/runs/{id}/tasks/{task}/logs
/// Get the captured log of a task
pub async fn get_task_logs(
    State(state): State<AppState>,
    Path((id, task)): Path<(Uuid, String)>,
) -> ApiResult<Json<TaskLogs>> {
    tracing::debug!("Getting logs of task {} in run {}", task, id);

    let logs = run_service::get_task_logs(&state.runs, id, &task).await?;

    Ok(Json(logs))
}
