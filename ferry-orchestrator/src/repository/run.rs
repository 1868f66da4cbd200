//! Run Repository
//!
//! Keeps the handle of every run launched by this orchestrator. Finished runs
//! are forgotten once they are older than the retention period; their
//! artifacts and release manifests stay on disk.

use ferry_runner::PipelineHandle;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

pub struct RunRepository {
    runs: RwLock<HashMap<Uuid, PipelineHandle>>,
    retention: Duration,
}

impl RunRepository {
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            runs: RwLock::default(),
            retention,
        }
    }

    /// Register a launched run, dropping expired ones
    pub async fn insert(&self, handle: PipelineHandle) {
        let mut runs = self.runs.write().await;
        self.evict(&mut runs);
        runs.insert(handle.id(), handle);
    }

    /// Forget finished runs older than the retention period
    pub async fn evict_expired(&self) -> usize {
        let mut runs = self.runs.write().await;
        self.evict(&mut runs)
    }

    fn evict(&self, runs: &mut HashMap<Uuid, PipelineHandle>) -> usize {
        let before = runs.len();
        runs.retain(|_, handle| {
            handle
                .snapshot()
                .finished_for()
                .is_none_or(|age| age < self.retention)
        });

        let evicted = before - runs.len();
        if evicted > 0 {
            debug!(evicted, "Evicted expired runs");
        }
        evicted
    }

    /// Find a run by ID
    pub async fn find_by_id(&self, id: Uuid) -> Option<PipelineHandle> {
        self.runs.read().await.get(&id).cloned()
    }

    /// List all runs, newest first
    pub async fn list_all(&self) -> Vec<PipelineHandle> {
        let mut handles: Vec<_> = self.runs.read().await.values().cloned().collect();
        handles.sort_by_key(|h| std::cmp::Reverse(h.snapshot().created_at));
        handles
    }

    /// List runs that have not reached a final state
    pub async fn list_active(&self) -> Vec<PipelineHandle> {
        self.runs
            .read()
            .await
            .values()
            .filter(|h| !h.is_finished())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::definition::PipelineDefinition;
    use ferry_core::domain::stage::Stage;
    use ferry_core::domain::task::TaskSpec;
    use ferry_runner::service::SecretStore;
    use ferry_runner::{PipelineEngine, RunnerConfig};

    #[cfg(unix)]
    fn hanging_run(engine: &PipelineEngine, workspace: &std::path::Path) -> PipelineHandle {
        let mut definition = PipelineDefinition::new("retention");
        definition.workspace = workspace.to_path_buf();
        let task = TaskSpec::new("linux", "linux", "/bin/sh").with_args(["-c", "sleep 30"]);
        definition.stages = vec![Stage::new("build").with_task(task)];
        engine.launch(definition, "v1").unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finished_runs_expire_live_runs_stay() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunnerConfig::new(dir.path().join("artifacts"));
        config.inherit_env = vec!["PATH".to_string()];
        let engine = PipelineEngine::with_process_executor(config, SecretStore::new());
        let repository = RunRepository::with_retention(Duration::ZERO);

        let finished = hanging_run(&engine, dir.path());
        let live = hanging_run(&engine, dir.path());
        repository.insert(finished.clone()).await;
        repository.insert(live.clone()).await;

        finished.abort().await.unwrap();
        finished.wait().await;

        assert_eq!(repository.evict_expired().await, 1);
        assert!(repository.find_by_id(finished.id()).await.is_none());
        assert!(repository.find_by_id(live.id()).await.is_some());

        live.abort().await.unwrap();
        live.wait().await;
    }
}
