//! Artifact aggregator
//!
//! Turns the outputs of a successful fan-out into the run's artifacts. All
//! claims are checked against each other and against the run's existing set
//! before anything is written, so a duplicate target leaves no trace.

use ferry_core::domain::artifact::{Artifact, ArtifactSet, DuplicateTarget};
use ferry_core::domain::run::FailureKind;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::scheduler::FanOutReport;
use crate::service::storage::{ArtifactStore, StorageError, StoreRequest};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Duplicate(#[from] DuplicateTarget),

    #[error("failed to store artifact: {0}")]
    Storage(#[from] StorageError),
}

impl AggregateError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AggregateError::Duplicate(_) => FailureKind::DuplicateArtifact,
            AggregateError::Storage(_) => FailureKind::ExecutionFault,
        }
    }
}

/// Identifies where aggregated artifacts come from
#[derive(Debug, Clone, Copy)]
pub struct AggregateScope<'a> {
    pub run_id: Uuid,
    pub version: &'a str,
    pub stage: &'a str,
}

#[derive(Clone)]
pub struct ArtifactAggregator {
    store: Arc<ArtifactStore>,
}

impl ArtifactAggregator {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    /// Registers one artifact per successful task that produced an output
    pub fn aggregate(
        &self,
        scope: AggregateScope<'_>,
        report: &FanOutReport,
        existing: &ArtifactSet,
    ) -> Result<Vec<Artifact>, AggregateError> {
        let claims: Vec<_> = report
            .results()
            .iter()
            .filter(|r| r.status.is_success())
            .filter_map(|r| r.outputs.first().map(|binary| (r, binary)))
            .collect();

        let mut claimed: HashMap<&str, &str> = HashMap::new();
        for (result, _) in &claims {
            let previous = existing
                .get(&result.target)
                .map(|a| a.task.as_str())
                .or_else(|| claimed.get(result.target.as_str()).copied());

            if let Some(previous) = previous {
                return Err(DuplicateTarget {
                    target: result.target.clone(),
                    existing: previous.to_string(),
                    claimed_by: result.task.clone(),
                }
                .into());
            }
            claimed.insert(&result.target, &result.task);
        }

        let mut artifacts = Vec::with_capacity(claims.len());
        for (result, binary) in claims {
            let request = StoreRequest {
                run_id: scope.run_id,
                version: scope.version,
                stage: scope.stage,
                task: &result.task,
                target: &result.target,
                binary,
                companions: &result.companions,
            };

            match self.store.store(&request) {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => {
                    self.discard(scope.run_id, &artifacts);
                    // The failed target may be half written
                    self.discard_target(scope.run_id, &result.target);
                    return Err(e.into());
                }
            }
        }

        info!(
            stage = %scope.stage,
            count = artifacts.len(),
            "Aggregated artifacts"
        );
        Ok(artifacts)
    }

    fn discard(&self, run_id: Uuid, artifacts: &[Artifact]) {
        for artifact in artifacts {
            self.discard_target(run_id, &artifact.target);
        }
    }

    fn discard_target(&self, run_id: Uuid, target: &str) {
        if let Err(e) = self.store.remove_target(run_id, target) {
            warn!(target = %target, "Failed to remove partial artifact: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::domain::task::{TaskResult, TaskSpec, TaskStatus};
    use std::path::{Path, PathBuf};

    fn built(work: &Path, task: &str, target: &str) -> TaskResult {
        let binary = work.join(format!("{}.bin", task));
        std::fs::write(&binary, task.as_bytes()).unwrap();

        let mut result = TaskResult::faulted(&TaskSpec::new(task, target, "cargo"), "");
        result.status = TaskStatus::Succeeded;
        result.error_message = None;
        result.outputs = vec![binary];
        result
    }

    fn scope(run_id: Uuid) -> AggregateScope<'static> {
        AggregateScope {
            run_id,
            version: "v1.0.0",
            stage: "build",
        }
    }

    #[test]
    fn test_one_artifact_per_target() {
        let work = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let aggregator = ArtifactAggregator::new(Arc::new(ArtifactStore::new(root.path())));
        let run_id = Uuid::new_v4();

        let mut no_output = built(work.path(), "docs", "docs");
        no_output.outputs.clear();
        let report = FanOutReport::from_results(vec![
            built(work.path(), "linux", "x86_64-unknown-linux-musl"),
            built(work.path(), "mac", "aarch64-apple-darwin"),
            no_output,
        ]);

        let artifacts = aggregator
            .aggregate(scope(run_id), &report, &ArtifactSet::new())
            .unwrap();

        let targets: Vec<_> = artifacts.iter().map(|a| a.target.as_str()).collect();
        assert_eq!(targets, vec!["x86_64-unknown-linux-musl", "aarch64-apple-darwin"]);
        assert!(artifacts.iter().all(|a| a.version == "v1.0.0" && a.stage == "build"));
        assert!(artifacts[0].binary.is_file());
    }

    #[test]
    fn test_duplicate_target_in_report_writes_nothing() {
        let work = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let aggregator = ArtifactAggregator::new(Arc::new(ArtifactStore::new(root.path())));
        let run_id = Uuid::new_v4();

        let report = FanOutReport::from_results(vec![
            built(work.path(), "linux-a", "x86_64-unknown-linux-musl"),
            built(work.path(), "linux-b", "x86_64-unknown-linux-musl"),
        ]);

        let err = aggregator
            .aggregate(scope(run_id), &report, &ArtifactSet::new())
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::DuplicateArtifact);
        match err {
            AggregateError::Duplicate(dup) => {
                assert_eq!(dup.existing, "linux-a");
                assert_eq!(dup.claimed_by, "linux-b");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!root.path().join(run_id.to_string()).exists());
    }

    #[test]
    fn test_duplicate_against_existing_set() {
        let work = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let aggregator = ArtifactAggregator::new(Arc::new(ArtifactStore::new(root.path())));
        let run_id = Uuid::new_v4();

        let mut existing = ArtifactSet::new();
        existing
            .insert(Artifact {
                target: "x86_64-unknown-linux-musl".into(),
                version: "v1.0.0".into(),
                stage: "build".into(),
                task: "linux".into(),
                binary: PathBuf::from("/elsewhere/app"),
                companions: vec![],
                sha256: String::new(),
                created_at: chrono::Utc::now(),
            })
            .unwrap();

        let report = FanOutReport::from_results(vec![
            built(work.path(), "mac", "aarch64-apple-darwin"),
            built(work.path(), "linux-again", "x86_64-unknown-linux-musl"),
        ]);

        let err = aggregator
            .aggregate(scope(run_id), &report, &existing)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::DuplicateArtifact);
        // The mac claim was valid but must not have been stored either
        assert!(!root.path().join(run_id.to_string()).exists());
    }
}
