//! Pipeline-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use ferry_core::dto::pipeline::{PipelinePlan, ValidatePipeline};

impl OrchestratorClient {
    /// Validate a TOML definition on the orchestrator
    ///
    /// # Returns
    /// The stage execution plan
    pub async fn validate_pipeline(&self, definition: impl Into<String>) -> Result<PipelinePlan> {
        let req = ValidatePipeline {
            definition: definition.into(),
        };
        let response = self
            .client
            .post(self.url("/api/pipeline/validate"))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }
}
