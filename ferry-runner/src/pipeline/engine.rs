use ferry_core::definition::PipelineDefinition;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use super::driver::RunDriver;
use super::handle::PipelineHandle;
use super::PipelineError;
use crate::config::RunnerConfig;
use crate::scheduler::Coordinator;
use crate::service::{
    ArtifactAggregator, ArtifactStore, ExecutionService, InMemoryLogBuffer, ManifestPublisher,
    ProcessExecutionService, ReleasePublisher, SecretStore,
};

const COMMAND_BUFFER: usize = 32;

/// Collaborators shared by every run of an engine
#[derive(Clone)]
pub(super) struct Services {
    pub config: Arc<RunnerConfig>,
    pub coordinator: Coordinator,
    pub aggregator: ArtifactAggregator,
    pub publisher: Arc<dyn ReleasePublisher>,
    pub secrets: Arc<SecretStore>,
}

/// Launches pipeline runs
///
/// All runs of one engine share its worker pool.
pub struct PipelineEngine {
    services: Services,
    store: Arc<ArtifactStore>,
}

impl PipelineEngine {
    pub fn new(
        config: RunnerConfig,
        executor: Arc<dyn ExecutionService>,
        secrets: SecretStore,
    ) -> Self {
        let store = Arc::new(ArtifactStore::new(config.artifact_dir.clone()));
        let coordinator = Coordinator::new(executor, config.pool_size());

        Self {
            services: Services {
                config: Arc::new(config),
                coordinator,
                aggregator: ArtifactAggregator::new(Arc::clone(&store)),
                publisher: Arc::new(ManifestPublisher::new(Arc::clone(&store))),
                secrets: Arc::new(secrets),
            },
            store,
        }
    }

    /// Engine running tasks as local processes
    pub fn with_process_executor(config: RunnerConfig, secrets: SecretStore) -> Self {
        let executor = Arc::new(ProcessExecutionService::new(config.kill_grace));
        Self::new(config, executor, secrets)
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ReleasePublisher>) -> Self {
        self.services.publisher = publisher;
        self
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.services.config
    }

    /// Validates the definition and starts a run for `version`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn launch(
        &self,
        definition: PipelineDefinition,
        version: impl Into<String>,
    ) -> Result<PipelineHandle, PipelineError> {
        definition.validate()?;

        let version = version.into();
        if version.trim().is_empty() {
            return Err(PipelineError::EmptyVersion);
        }

        let id = Uuid::new_v4();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let logs = Arc::new(InMemoryLogBuffer::with_line_limit(
            self.services.config.max_log_lines,
        ));

        info!(run_id = %id, pipeline = %definition.name, version = %version, "Launching run");

        let driver = RunDriver::new(
            id,
            definition,
            version,
            self.services.clone(),
            Arc::clone(&logs),
            commands_rx,
        );
        let report = driver.subscribe();
        tokio::spawn(driver.run());

        Ok(PipelineHandle::new(id, commands_tx, report, logs))
    }
}
