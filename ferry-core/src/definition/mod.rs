//! Pipeline definitions
//!
//! A definition is a TOML document listing stages and their tasks. Once
//! validated it is the run's task registry: every task is addressable by
//! its pipeline-wide unique name, and nothing in it changes for the
//! lifetime of the run.

mod template;
mod validate;

pub use template::{render, TemplateError, TemplateVars};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::stage::Stage;
use crate::domain::task::TaskSpec;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pipeline definition: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("pipeline name must not be empty")]
    EmptyName,

    #[error("pipeline has no stages")]
    NoStages,

    #[error("stage '{0}' has no tasks")]
    EmptyStage(String),

    #[error("duplicate stage name '{0}'")]
    DuplicateStage(String),

    #[error("duplicate task name '{0}'")]
    DuplicateTask(String),

    #[error("stage '{stage}' depends on unknown stage '{dependency}'")]
    UnknownDependency { stage: String, dependency: String },

    #[error("stage '{0}' depends on itself")]
    SelfDependency(String),

    #[error("stage dependencies contain a cycle through '{0}'")]
    Cycle(String),

    #[error("task '{0}' has an empty program")]
    EmptyProgram(String),

    #[error("task '{0}' requests zero cpus")]
    ZeroCpus(String),

    #[error("task '{task}': {source}")]
    Template {
        task: String,
        #[source]
        source: TemplateError,
    },

    #[error("approval message of stage '{stage}': {source}")]
    ApprovalTemplate {
        stage: String,
        #[source]
        source: TemplateError,
    },
}

/// A pipeline of stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,

    /// Root directory task working directories are resolved against
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    #[serde(default)]
    pub stages: Vec<Stage>,
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workspace: default_workspace(),
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Parses and validates a TOML definition
    pub fn from_toml_str(source: &str) -> Result<Self, DefinitionError> {
        let definition: Self = toml::from_str(source)?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        validate::validate(self)
    }

    /// One valid execution order of the stages
    pub fn plan(&self) -> Result<Vec<String>, DefinitionError> {
        validate::validate(self)?;
        validate::topological_order(self)
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Looks up a task by name, with the stage that owns it
    pub fn task(&self, name: &str) -> Option<(&Stage, &TaskSpec)> {
        self.stages.iter().find_map(|stage| {
            stage
                .tasks
                .iter()
                .find(|t| t.name == name)
                .map(|task| (stage, task))
        })
    }

    /// Stages that list `stage` as a dependency
    pub fn dependents<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a Stage> + 'a {
        self.stages
            .iter()
            .filter(move |s| s.depends_on.iter().any(|d| d == stage))
    }
}
