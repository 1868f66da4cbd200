//! Task domain types
//!
//! A task is one invocation of an external tool (a build for one target,
//! a deploy to one host). Tasks are grouped into stages and fanned out
//! concurrently.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::log::LogEntry;
use crate::domain::run::FailureKind;

/// Specification of a single unit of work
///
/// Immutable once the pipeline definition has been validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Task identifier, unique across the whole pipeline
    pub name: String,

    /// Target platform or environment (e.g. `x86_64-unknown-linux-musl`, `production`)
    pub target: String,

    /// Executable to invoke (looked up on the inherited `PATH`)
    pub program: String,

    /// Argument templates
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory relative to the pipeline workspace
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// Output path template, relative to the working directory
    #[serde(default)]
    pub output: Option<String>,

    /// Files shipped next to the binary (license, readme), relative to the working directory
    #[serde(default)]
    pub companions: Vec<String>,

    /// Plain environment variables (values are templates)
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Names of secrets injected from the stage's environment scope
    #[serde(default)]
    pub secrets: Vec<String>,

    #[serde(default)]
    pub resources: ResourceRequirements,

    /// Overrides the configured task timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl TaskSpec {
    /// Minimal task used by builders and tests
    pub fn new(name: impl Into<String>, target: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            output: None,
            companions: Vec::new(),
            env: BTreeMap::new(),
            secrets: Vec::new(),
            resources: ResourceRequirements::default(),
            timeout_secs: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Resources a task claims from the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Worker slots held while the task runs
    #[serde(default = "default_cpus")]
    pub cpus: u32,

    /// Informational only
    #[serde(default)]
    pub memory_mb: Option<u64>,
}

fn default_cpus() -> u32 {
    1
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self {
            cpus: default_cpus(),
            memory_mb: None,
        }
    }
}

/// Task execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Succeeded,
    /// The command ran and exited non-zero
    Failed,
    TimedOut,
    /// The command could not be run at all (missing binary, bad workdir, crash)
    Faulted,
    Cancelled,
}

impl TaskStatus {
    pub fn is_success(self) -> bool {
        self == TaskStatus::Succeeded
    }

    /// Error taxonomy kind for a non-successful status
    pub fn failure_kind(self) -> Option<FailureKind> {
        match self {
            TaskStatus::Succeeded => None,
            TaskStatus::Failed => Some(FailureKind::CommandFailure),
            TaskStatus::TimedOut => Some(FailureKind::Timeout),
            TaskStatus::Faulted => Some(FailureKind::ExecutionFault),
            TaskStatus::Cancelled => Some(FailureKind::Cancelled),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Succeeded => write!(f, "Succeeded"),
            TaskStatus::Failed => write!(f, "Failed"),
            TaskStatus::TimedOut => write!(f, "TimedOut"),
            TaskStatus::Faulted => write!(f, "Faulted"),
            TaskStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Outcome of running a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: String,
    pub target: String,
    pub status: TaskStatus,
    pub exit_code: Option<i32>,
    pub error_message: Option<String>,
    /// Resolved output paths (empty unless the task succeeded and declared an output)
    pub outputs: Vec<PathBuf>,
    /// Resolved companion file paths
    pub companions: Vec<PathBuf>,
    pub log: Vec<LogEntry>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

impl TaskResult {
    /// A result for a task that never produced a process
    pub fn faulted(task: &TaskSpec, message: impl Into<String>) -> Self {
        Self::without_process(task, TaskStatus::Faulted, message)
    }

    /// A result for a task cancelled before it started
    pub fn cancelled(task: &TaskSpec) -> Self {
        Self::without_process(task, TaskStatus::Cancelled, "Cancelled before start")
    }

    fn without_process(task: &TaskSpec, status: TaskStatus, message: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            task: task.name.clone(),
            target: task.target.clone(),
            status,
            exit_code: None,
            error_message: Some(message.into()),
            outputs: Vec::new(),
            companions: Vec::new(),
            log: Vec::new(),
            started_at: now,
            completed_at: now,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at.signed_duration_since(self.started_at)
    }
}
