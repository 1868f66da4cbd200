//! Approval gate API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use ferry_core::domain::approval::ApprovalGate;
use ferry_core::dto::approval::{ApproveStage, RejectStage};
use uuid::Uuid;

impl OrchestratorClient {
    /// Every gate currently awaiting a decision
    pub async fn list_approvals(&self) -> Result<Vec<ApprovalGate>> {
        let response = self.client.get(self.url("/api/approvals")).send().await?;

        self.handle_response(response).await
    }

    pub async fn approve_stage(&self, run_id: Uuid, stage: &str, by: &str) -> Result<()> {
        let url = self.url(&format!("/api/runs/{}/stages/{}/approve", run_id, stage));
        let req = ApproveStage { by: by.to_string() };
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_empty_response(response).await
    }

    pub async fn reject_stage(
        &self,
        run_id: Uuid,
        stage: &str,
        by: &str,
        reason: Option<String>,
    ) -> Result<()> {
        let url = self.url(&format!("/api/runs/{}/stages/{}/reject", run_id, stage));
        let req = RejectStage {
            by: by.to_string(),
            reason,
        };
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_empty_response(response).await
    }
}
