//! Run DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::run::{RunReport, RunState};
use crate::domain::stage::StageState;

/// Request to launch a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchRun {
    /// TOML source of the definition
    pub definition: String,
    /// Version tag the release is built for
    pub version: String,
}

/// Response to a launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLaunched {
    pub id: Uuid,
    pub pipeline: String,
    pub version: String,
}

/// Condensed view of a run for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub pipeline: String,
    pub version: String,
    pub state: RunState,
    pub stages_total: usize,
    pub stages_succeeded: usize,
    pub awaiting_approval: Vec<String>,
    pub artifacts: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&RunReport> for RunSummary {
    fn from(report: &RunReport) -> Self {
        Self {
            id: report.id,
            pipeline: report.pipeline.clone(),
            version: report.version.clone(),
            state: report.state,
            stages_total: report.stages.len(),
            stages_succeeded: report
                .stages
                .iter()
                .filter(|s| s.state == StageState::Succeeded)
                .count(),
            awaiting_approval: report.pending_gates().map(|g| g.stage.clone()).collect(),
            artifacts: report.artifacts.len(),
            created_at: report.created_at,
            completed_at: report.completed_at,
        }
    }
}
