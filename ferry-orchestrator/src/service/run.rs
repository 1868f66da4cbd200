//! Run Service
//!
//! Business logic for launching, observing and aborting runs.

use ferry_core::definition::{DefinitionError, PipelineDefinition};
use ferry_core::domain::artifact::Artifact;
use ferry_core::domain::run::RunReport;
use ferry_core::dto::log::TaskLogs;
use ferry_core::dto::run::{LaunchRun, RunLaunched, RunSummary};
use ferry_runner::{PipelineEngine, PipelineError, PipelineHandle};
use thiserror::Error;
use uuid::Uuid;

use crate::repository::RunRepository;

/// Service error type
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Run {0} not found")]
    NotFound(Uuid),

    #[error("No log captured for task '{task}' in run {run}")]
    LogsNotFound { run: Uuid, task: String },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub type Result<T> = std::result::Result<T, RunError>;

/// Parse the definition and launch a run for the requested version
pub async fn launch_run(
    engine: &PipelineEngine,
    runs: &RunRepository,
    req: LaunchRun,
) -> Result<RunLaunched> {
    let definition = PipelineDefinition::from_toml_str(&req.definition)?;
    let pipeline = definition.name.clone();

    let handle = engine.launch(definition, req.version.clone())?;
    let id = handle.id();
    runs.insert(handle).await;

    tracing::info!("Run launched: {} ({} {})", id, pipeline, req.version);

    Ok(RunLaunched {
        id,
        pipeline,
        version: req.version,
    })
}

/// Find a run's handle by ID
pub async fn find_run(runs: &RunRepository, id: Uuid) -> Result<PipelineHandle> {
    runs.find_by_id(id).await.ok_or(RunError::NotFound(id))
}

/// Get the latest report of a run
pub async fn get_run(runs: &RunRepository, id: Uuid) -> Result<RunReport> {
    Ok(find_run(runs, id).await?.snapshot())
}

/// List all runs, newest first
pub async fn list_runs(runs: &RunRepository) -> Vec<RunSummary> {
    runs.list_all()
        .await
        .iter()
        .map(|h| RunSummary::from(&h.snapshot()))
        .collect()
}

/// Request cancellation of a run
pub async fn abort_run(runs: &RunRepository, id: Uuid) -> Result<()> {
    let handle = find_run(runs, id).await?;
    handle.abort().await?;

    tracing::info!("Run abort requested: {}", id);
    Ok(())
}

/// Artifacts registered so far
pub async fn get_artifacts(runs: &RunRepository, id: Uuid) -> Result<Vec<Artifact>> {
    Ok(find_run(runs, id).await?.snapshot().artifacts)
}

/// Captured log of one task, including tasks still running
pub async fn get_task_logs(runs: &RunRepository, id: Uuid, task: &str) -> Result<TaskLogs> {
    let handle = find_run(runs, id).await?;
    let entries = handle.logs(task).ok_or_else(|| RunError::LogsNotFound {
        run: id,
        task: task.to_string(),
    })?;

    Ok(TaskLogs {
        run_id: id,
        task: task.to_string(),
        entries,
    })
}

/// Abort every active run and wait for each to settle
pub async fn abort_all(runs: &RunRepository, grace: std::time::Duration) {
    let active = runs.list_active().await;
    if active.is_empty() {
        return;
    }

    tracing::info!("Aborting {} active run(s)", active.len());
    for handle in &active {
        if let Err(e) = handle.abort().await {
            tracing::debug!("Run {} already settled: {}", handle.id(), e);
        }
    }

    for handle in &active {
        if tokio::time::timeout(grace, handle.wait()).await.is_err() {
            tracing::warn!("Run {} did not settle within {:?}", handle.id(), grace);
        }
    }
}
