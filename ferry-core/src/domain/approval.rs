//! Approval gate domain types

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Approval declaration on a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSpec {
    /// Prompt shown to the approver (may contain placeholders)
    pub message: String,
}

/// A manual checkpoint blocking a stage until resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalGate {
    pub run_id: Uuid,
    pub stage: String,
    pub message: String,
    pub requested_at: chrono::DateTime<chrono::Utc>,
    pub resolution: Option<ApprovalResolution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalResolution {
    Approved {
        by: String,
        at: chrono::DateTime<chrono::Utc>,
    },
    Rejected {
        by: String,
        reason: Option<String>,
        at: chrono::DateTime<chrono::Utc>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("approval gate for stage '{stage}' is already resolved")]
pub struct GateAlreadyResolved {
    pub stage: String,
}

impl ApprovalGate {
    pub fn open(run_id: Uuid, stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            run_id,
            stage: stage.into(),
            message: message.into(),
            requested_at: chrono::Utc::now(),
            resolution: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.resolution.is_none()
    }

    /// Resolves the gate. A gate resolves exactly once.
    pub fn resolve(&mut self, resolution: ApprovalResolution) -> Result<(), GateAlreadyResolved> {
        if self.resolution.is_some() {
            return Err(GateAlreadyResolved {
                stage: self.stage.clone(),
            });
        }
        self.resolution = Some(resolution);
        Ok(())
    }
}
