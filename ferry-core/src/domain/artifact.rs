//! Artifact domain types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A versioned, target-specific build output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub target: String,
    pub version: String,
    pub stage: String,
    pub task: String,
    /// Stored binary path
    pub binary: PathBuf,
    /// Stored companion files (license, readme)
    pub companions: Vec<PathBuf>,
    pub sha256: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("duplicate artifact for target '{target}': claimed by '{claimed_by}', already produced by '{existing}'")]
pub struct DuplicateTarget {
    pub target: String,
    pub existing: String,
    pub claimed_by: String,
}

/// Append-only set of artifacts, at most one per target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactSet {
    artifacts: Vec<Artifact>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.target == target)
    }

    pub fn contains_target(&self, target: &str) -> bool {
        self.get(target).is_some()
    }

    pub fn insert(&mut self, artifact: Artifact) -> Result<(), DuplicateTarget> {
        if let Some(existing) = self.get(&artifact.target) {
            return Err(DuplicateTarget {
                target: artifact.target,
                existing: existing.task.clone(),
                claimed_by: artifact.task,
            });
        }
        self.artifacts.push(artifact);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Artifact> {
        self.artifacts.clone()
    }
}
