//! Execution environment
//!
//! An [`ExecutionEnv`] is everything a task invocation may see of the outside
//! world. It is built once per stage, never mutated, and shared read-only by
//! the stage's tasks. Host variables are captured at construction from an
//! allow-list; nothing else of the orchestrator's environment reaches a task.

use ferry_core::definition::TemplateVars;
use ferry_core::domain::secret::SecretTable;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::service::{InMemoryLogBuffer, LogBufferService};

#[derive(Clone)]
pub struct ExecutionEnv {
    pub run_id: Uuid,
    pub version: String,
    pub stage: String,
    /// Directory task working directories are resolved against
    pub workspace: PathBuf,
    /// Host variables passed through to the child
    pub inherited: BTreeMap<String, String>,
    pub secrets: Arc<SecretTable>,
    /// Used when a task has no `timeout_secs` of its own
    pub default_timeout: Duration,
    pub logs: Arc<dyn LogBufferService>,
}

impl ExecutionEnv {
    pub fn new(
        run_id: Uuid,
        version: impl Into<String>,
        stage: impl Into<String>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            run_id,
            version: version.into(),
            stage: stage.into(),
            workspace: workspace.into(),
            inherited: BTreeMap::new(),
            secrets: Arc::new(SecretTable::new()),
            default_timeout: Duration::from_secs(3600),
            logs: Arc::new(InMemoryLogBuffer::new()),
        }
    }

    /// Copies the named variables from the host environment, skipping unset ones
    pub fn inherit<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            if let Ok(value) = std::env::var(name) {
                self.inherited.insert(name.to_string(), value);
            }
        }
        self
    }

    pub fn with_secrets(mut self, secrets: SecretTable) -> Self {
        self.secrets = Arc::new(secrets);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_logs(mut self, logs: Arc<dyn LogBufferService>) -> Self {
        self.logs = logs;
        self
    }

    /// Template values for one task
    pub fn vars<'a>(&'a self, task: &'a str, target: &'a str) -> TemplateVars<'a> {
        TemplateVars {
            target,
            version: &self.version,
            task,
            stage: &self.stage,
        }
    }
}

impl std::fmt::Debug for ExecutionEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEnv")
            .field("run_id", &self.run_id)
            .field("version", &self.version)
            .field("stage", &self.stage)
            .field("workspace", &self.workspace)
            .field("inherited", &self.inherited.keys().collect::<Vec<_>>())
            .field("secrets", &self.secrets)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}
