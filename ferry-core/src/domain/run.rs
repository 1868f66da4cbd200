//! Run domain types
//!
//! A run is one execution of a pipeline definition for a version tag. The
//! engine publishes a [`RunReport`] snapshot on every transition.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::domain::approval::ApprovalGate;
use crate::domain::artifact::Artifact;
use crate::domain::stage::StageState;
use crate::domain::task::TaskResult;

/// Error taxonomy for stages and tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The command ran and exited non-zero
    CommandFailure,
    Timeout,
    /// The command could not be run, or crashed
    ExecutionFault,
    DuplicateArtifact,
    DependencyUnmet,
    ApprovalAborted,
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::CommandFailure => "CommandFailure",
            FailureKind::Timeout => "Timeout",
            FailureKind::ExecutionFault => "ExecutionFault",
            FailureKind::DuplicateArtifact => "DuplicateArtifact",
            FailureKind::DependencyUnmet => "DependencyUnmet",
            FailureKind::ApprovalAborted => "ApprovalAborted",
            FailureKind::Cancelled => "Cancelled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_finished(self) -> bool {
        self != RunState::Running
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running => write!(f, "Running"),
            RunState::Succeeded => write!(f, "Succeeded"),
            RunState::Failed => write!(f, "Failed"),
            RunState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// State of one stage within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    pub state: StageState,
    pub failure: Option<FailureKind>,
    /// Human readable detail for a failure (failed task summary, blocking stage, ...)
    pub message: Option<String>,
    pub best_effort: bool,
    pub depends_on: Vec<String>,
    /// Results in definition order, filled in once the stage's fan-out returns
    pub tasks: Vec<TaskResult>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Record returned by the release publisher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub version: String,
    pub pipeline: String,
    pub run_id: Uuid,
    pub manifest: PathBuf,
    pub artifact_count: usize,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

/// Snapshot of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub id: Uuid,
    pub pipeline: String,
    pub version: String,
    pub state: RunState,
    pub stages: Vec<StageReport>,
    pub artifacts: Vec<Artifact>,
    pub gates: Vec<ApprovalGate>,
    pub release: Option<ReleaseRecord>,
    /// Why the release could not be published, if it was attempted and failed
    pub release_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl RunReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn task_result(&self, task: &str) -> Option<&TaskResult> {
        self.stages
            .iter()
            .flat_map(|s| s.tasks.iter())
            .find(|t| t.task == task)
    }

    pub fn pending_gates(&self) -> impl Iterator<Item = &ApprovalGate> {
        self.gates.iter().filter(|g| g.is_pending())
    }

    pub fn failed_stages(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|s| s.failure.is_some())
    }

    /// Time since the run finished; `None` while it is still live
    pub fn finished_for(&self) -> Option<std::time::Duration> {
        self.completed_at
            .map(|at| (chrono::Utc::now() - at).to_std().unwrap_or_default())
    }
}
