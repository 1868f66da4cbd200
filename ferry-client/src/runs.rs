//! Run-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use ferry_core::domain::artifact::Artifact;
use ferry_core::domain::run::RunReport;
use ferry_core::dto::log::TaskLogs;
use ferry_core::dto::run::{LaunchRun, RunLaunched, RunSummary};
use uuid::Uuid;

impl OrchestratorClient {
    // =============================================================================
    // Run Lifecycle
    // =============================================================================

    /// Launch a run of a definition for a version tag
    pub async fn launch_run(&self, req: LaunchRun) -> Result<RunLaunched> {
        let response = self
            .client
            .post(self.url("/api/runs"))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List all runs, newest first
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        let response = self.client.get(self.url("/api/runs")).send().await?;

        self.handle_response(response).await
    }

    /// Get the full report of a run
    pub async fn get_run(&self, run_id: Uuid) -> Result<RunReport> {
        let url = self.url(&format!("/api/runs/{}", run_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Cancel a run
    pub async fn abort_run(&self, run_id: Uuid) -> Result<()> {
        let url = self.url(&format!("/api/runs/{}/abort", run_id));
        let response = self.client.post(&url).send().await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Run Outputs
    // =============================================================================

    /// Artifacts registered for a run
    pub async fn get_artifacts(&self, run_id: Uuid) -> Result<Vec<Artifact>> {
        let url = self.url(&format!("/api/runs/{}/artifacts", run_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Captured log of a task
    pub async fn get_task_logs(&self, run_id: Uuid, task: &str) -> Result<TaskLogs> {
        let url = self.url(&format!("/api/runs/{}/tasks/{}/logs", run_id, task));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
