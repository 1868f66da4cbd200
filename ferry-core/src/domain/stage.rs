//! Stage domain types

use serde::{Deserialize, Serialize};

use crate::domain::approval::ApprovalSpec;
use crate::domain::task::TaskSpec;

/// A named phase of the pipeline
///
/// Stages form a DAG through `depends_on`. Every task of a stage is fanned
/// out concurrently once the stage starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,

    #[serde(default)]
    pub tasks: Vec<TaskSpec>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Manual approval required before the stage may run
    #[serde(default)]
    pub approval: Option<ApprovalSpec>,

    /// A failure of this stage neither blocks dependents nor fails the run
    #[serde(default)]
    pub best_effort: bool,

    /// Secret scope injected into this stage's tasks
    #[serde(default)]
    pub environment: Option<String>,

    /// Defaults to true when any task declares an output
    #[serde(default)]
    pub collect_artifacts: Option<bool>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
            depends_on: Vec::new(),
            approval: None,
            best_effort: false,
            environment: None,
            collect_artifacts: None,
        }
    }

    pub fn with_task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn depends_on(mut self, stage: impl Into<String>) -> Self {
        self.depends_on.push(stage.into());
        self
    }

    pub fn with_approval(mut self, message: impl Into<String>) -> Self {
        self.approval = Some(ApprovalSpec {
            message: message.into(),
        });
        self
    }

    pub fn collects_artifacts(&self) -> bool {
        self.collect_artifacts
            .unwrap_or_else(|| self.tasks.iter().any(|t| t.output.is_some()))
    }

    pub fn requires_approval(&self) -> bool {
        self.approval.is_some()
    }
}

/// Lifecycle state of a stage within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageState {
    Pending,
    Ready,
    AwaitingApproval,
    Approved,
    Running,
    Succeeded,
    Failed,
    /// Approval gate rejected
    Aborted,
    /// Running when the run was aborted
    Cancelled,
    /// Never started: a dependency failed or the run was aborted first
    Blocked,
}

impl StageState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageState::Succeeded
                | StageState::Failed
                | StageState::Aborted
                | StageState::Cancelled
                | StageState::Blocked
        )
    }

    pub fn can_transition_to(self, next: StageState) -> bool {
        use StageState::*;

        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, Blocked)
                | (Ready, AwaitingApproval)
                | (Ready, Running)
                | (Ready, Blocked)
                | (AwaitingApproval, Approved)
                | (AwaitingApproval, Aborted)
                | (Approved, Running)
                | (Approved, Blocked)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageState::Pending => "Pending",
            StageState::Ready => "Ready",
            StageState::AwaitingApproval => "AwaitingApproval",
            StageState::Approved => "Approved",
            StageState::Running => "Running",
            StageState::Succeeded => "Succeeded",
            StageState::Failed => "Failed",
            StageState::Aborted => "Aborted",
            StageState::Cancelled => "Cancelled",
            StageState::Blocked => "Blocked",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StageState::*;

    const ALL: [StageState; 10] = [
        Pending,
        Ready,
        AwaitingApproval,
        Approved,
        Running,
        Succeeded,
        Failed,
        Aborted,
        Cancelled,
        Blocked,
    ];

    #[test]
    fn test_gated_path_is_legal() {
        assert!(Pending.can_transition_to(Ready));
        assert!(Ready.can_transition_to(AwaitingApproval));
        assert!(AwaitingApproval.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Running));
        assert!(Running.can_transition_to(Succeeded));
    }

    #[test]
    fn test_gate_cannot_be_skipped() {
        assert!(!AwaitingApproval.can_transition_to(Running));
        assert!(!AwaitingApproval.can_transition_to(Succeeded));
        assert!(!Pending.can_transition_to(Running));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(
                    !from.can_transition_to(to),
                    "{} -> {} should be refused",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_collects_artifacts_default() {
        let build = Stage::new("build")
            .with_task(TaskSpec::new("linux", "linux", "cargo").with_output("bin/app"));
        assert!(build.collects_artifacts());

        let deploy = Stage::new("deploy").with_task(TaskSpec::new("prod", "production", "ssh"));
        assert!(!deploy.collects_artifacts());

        let mut forced = deploy.clone();
        forced.collect_artifacts = Some(true);
        assert!(forced.collects_artifacts());
    }
}
