use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

use super::template::check;
use super::{DefinitionError, PipelineDefinition};

type StageGraph<'a> = DiGraph<&'a str, ()>;

pub(super) fn validate(def: &PipelineDefinition) -> Result<(), DefinitionError> {
    if def.name.trim().is_empty() {
        return Err(DefinitionError::EmptyName);
    }
    if def.stages.is_empty() {
        return Err(DefinitionError::NoStages);
    }

    let mut stage_names = HashSet::new();
    let mut task_names = HashSet::new();

    for stage in &def.stages {
        if !stage_names.insert(stage.name.as_str()) {
            return Err(DefinitionError::DuplicateStage(stage.name.clone()));
        }
        if stage.tasks.is_empty() {
            return Err(DefinitionError::EmptyStage(stage.name.clone()));
        }
        if let Some(approval) = &stage.approval {
            check(&approval.message).map_err(|source| DefinitionError::ApprovalTemplate {
                stage: stage.name.clone(),
                source,
            })?;
        }

        for task in &stage.tasks {
            if !task_names.insert(task.name.as_str()) {
                return Err(DefinitionError::DuplicateTask(task.name.clone()));
            }
            if task.program.trim().is_empty() {
                return Err(DefinitionError::EmptyProgram(task.name.clone()));
            }
            if task.resources.cpus == 0 {
                return Err(DefinitionError::ZeroCpus(task.name.clone()));
            }

            let templates = task
                .args
                .iter()
                .chain(task.output.iter())
                .chain(task.companions.iter())
                .chain(task.env.values());
            for template in templates {
                check(template).map_err(|source| DefinitionError::Template {
                    task: task.name.clone(),
                    source,
                })?;
            }
        }
    }

    for stage in &def.stages {
        for dependency in &stage.depends_on {
            if dependency == &stage.name {
                return Err(DefinitionError::SelfDependency(stage.name.clone()));
            }
            if !stage_names.contains(dependency.as_str()) {
                return Err(DefinitionError::UnknownDependency {
                    stage: stage.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    topological_order(def).map(|_| ())
}

/// Edges run from a dependency to its dependent
fn build_graph(def: &PipelineDefinition) -> StageGraph<'_> {
    let mut graph = StageGraph::new();
    let mut index_by_name: HashMap<&str, NodeIndex> = HashMap::new();

    for stage in &def.stages {
        let idx = graph.add_node(stage.name.as_str());
        index_by_name.insert(stage.name.as_str(), idx);
    }

    for stage in &def.stages {
        for dependency in &stage.depends_on {
            if let (Some(&from), Some(&to)) = (
                index_by_name.get(dependency.as_str()),
                index_by_name.get(stage.name.as_str()),
            ) {
                graph.add_edge(from, to, ());
            }
        }
    }

    graph
}

pub(super) fn topological_order(def: &PipelineDefinition) -> Result<Vec<String>, DefinitionError> {
    let graph = build_graph(def);
    let order = toposort(&graph, None)
        .map_err(|cycle| DefinitionError::Cycle(graph[cycle.node_id()].to_string()))?;

    Ok(order.into_iter().map(|idx| graph[idx].to_string()).collect())
}
