//! Pipeline DTOs

use serde::{Deserialize, Serialize};

use crate::definition::PipelineDefinition;

/// Request to validate a definition without running it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatePipeline {
    /// TOML source of the definition
    pub definition: String,
}

/// Execution plan of a valid definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub pipeline: String,
    /// Stages in one valid execution order
    pub stages: Vec<PlannedStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStage {
    pub name: String,
    pub depends_on: Vec<String>,
    pub tasks: Vec<String>,
    pub approval: Option<String>,
    pub best_effort: bool,
    pub collects_artifacts: bool,
}

impl PipelinePlan {
    /// Builds the plan from an already validated definition's stage order
    pub fn new(definition: &PipelineDefinition, order: &[String]) -> Self {
        let stages = order
            .iter()
            .filter_map(|name| definition.stage(name))
            .map(|stage| PlannedStage {
                name: stage.name.clone(),
                depends_on: stage.depends_on.clone(),
                tasks: stage.tasks.iter().map(|t| t.name.clone()).collect(),
                approval: stage.approval.as_ref().map(|a| a.message.clone()),
                best_effort: stage.best_effort,
                collects_artifacts: stage.collects_artifacts(),
            })
            .collect();

        Self {
            pipeline: definition.name.clone(),
            stages,
        }
    }
}
