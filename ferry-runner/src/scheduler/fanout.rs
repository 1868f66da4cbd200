//! Fan-out coordinator
//!
//! Runs a stage's tasks concurrently on the shared worker pool and gathers
//! one result per task. A failing task never cancels its siblings; every
//! task runs to its own end so its log is complete.

use ferry_core::domain::run::FailureKind;
use ferry_core::domain::task::{TaskResult, TaskSpec};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::execution::ExecutionEnv;
use crate::service::ExecutionService;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FanOutError {
    #[error("task '{0}' appears more than once")]
    DuplicateTask(String),
}

/// Results of one fan-out, in input order
#[derive(Debug, Clone)]
pub struct FanOutReport {
    results: Vec<TaskResult>,
}

impl FanOutReport {
    pub fn from_results(results: Vec<TaskResult>) -> Self {
        Self { results }
    }

    pub fn get(&self, task: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.task == task)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[TaskResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<TaskResult> {
        self.results
    }

    /// The all-or-nothing gate
    pub fn succeeded(&self) -> bool {
        self.results.iter().all(|r| r.status.is_success())
    }

    /// Every failed task with its kind, in input order
    pub fn failures(&self) -> Vec<(&str, FailureKind)> {
        self.results
            .iter()
            .filter_map(|r| r.status.failure_kind().map(|k| (r.task.as_str(), k)))
            .collect()
    }

    /// One line per failed task
    pub fn summary(&self) -> String {
        let failures: Vec<String> = self
            .results
            .iter()
            .filter(|r| !r.status.is_success())
            .map(|r| {
                let kind = r
                    .status
                    .failure_kind()
                    .map(|k| k.to_string())
                    .unwrap_or_default();
                match &r.error_message {
                    Some(message) => format!("{} [{}]: {}", r.task, kind, message),
                    None => format!("{} [{}]", r.task, kind),
                }
            })
            .collect();

        if failures.is_empty() {
            format!("all {} task(s) succeeded", self.results.len())
        } else {
            format!(
                "{} of {} task(s) failed: {}",
                failures.len(),
                self.results.len(),
                failures.join("; ")
            )
        }
    }
}

/// Runs tasks on a bounded, weighted worker pool
///
/// A task holds `resources.cpus` permits (at least one, at most the pool
/// size) while it runs.
#[derive(Clone)]
pub struct Coordinator {
    executor: Arc<dyn ExecutionService>,
    pool: Arc<Semaphore>,
    pool_size: u32,
}

impl Coordinator {
    pub fn new(executor: Arc<dyn ExecutionService>, pool_size: u32) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            executor,
            pool: Arc::new(Semaphore::new(pool_size as usize)),
            pool_size,
        }
    }

    fn weight(&self, task: &TaskSpec) -> u32 {
        task.resources.cpus.clamp(1, self.pool_size)
    }

    pub async fn run_all(
        &self,
        tasks: &[TaskSpec],
        env: Arc<ExecutionEnv>,
        cancel: &CancellationToken,
    ) -> Result<FanOutReport, FanOutError> {
        let mut seen = HashSet::new();
        if let Some(dup) = tasks.iter().find(|t| !seen.insert(t.name.as_str())) {
            return Err(FanOutError::DuplicateTask(dup.name.clone()));
        }

        info!(stage = %env.stage, tasks = tasks.len(), "Fanning out");

        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let handle = self.spawn_task(task.clone(), Arc::clone(&env), cancel.clone());
            handles.push((task, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (task, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(task = %task.name, "Task panicked: {}", e);
                    TaskResult::faulted(task, format!("task panicked: {}", e))
                }
            };
            results.push(result);
        }

        let report = FanOutReport { results };
        if report.succeeded() {
            info!(stage = %env.stage, "Fan-out succeeded");
        } else {
            warn!(stage = %env.stage, "Fan-out failed: {}", report.summary());
        }

        Ok(report)
    }

    fn spawn_task(
        &self,
        task: TaskSpec,
        env: Arc<ExecutionEnv>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<TaskResult> {
        let executor = Arc::clone(&self.executor);
        let pool = Arc::clone(&self.pool);
        let weight = self.weight(&task);

        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;

                () = cancel.cancelled() => return TaskResult::cancelled(&task),
                permit = pool.acquire_many_owned(weight) => permit,
            };

            let _permit = match permit {
                Ok(permit) => permit,
                Err(_) => return TaskResult::faulted(&task, "worker pool closed"),
            };

            debug!(task = %task.name, weight, "Acquired worker slots");
            // Permits are released when dropped
            executor.run(&task, &env, cancel).await
        })
    }
}
