use ferry_core::domain::log::LogEntry;
use ferry_core::domain::run::RunReport;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use super::PipelineError;
use super::driver::Command;
use crate::service::{InMemoryLogBuffer, LogBufferService};

/// Control and observation handle for one run
///
/// Cheap to clone. Once every handle is dropped the run is aborted, since
/// nobody could resolve its gates anymore.
#[derive(Clone)]
pub struct PipelineHandle {
    id: Uuid,
    commands: mpsc::Sender<Command>,
    report: watch::Receiver<RunReport>,
    logs: Arc<InMemoryLogBuffer>,
}

impl PipelineHandle {
    pub(super) fn new(
        id: Uuid,
        commands: mpsc::Sender<Command>,
        report: watch::Receiver<RunReport>,
        logs: Arc<InMemoryLogBuffer>,
    ) -> Self {
        Self {
            id,
            commands,
            report,
            logs,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Latest published report
    pub fn snapshot(&self) -> RunReport {
        self.report.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.report.borrow().state.is_finished()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunReport> {
        self.report.clone()
    }

    /// Live log of a task, including tasks still running
    pub fn logs(&self, task: &str) -> Option<Vec<LogEntry>> {
        self.logs.entries(task)
    }

    pub async fn approve(&self, stage: &str, by: &str) -> Result<(), PipelineError> {
        self.request(|reply| Command::Approve {
            stage: stage.to_string(),
            by: by.to_string(),
            reply,
        })
        .await
    }

    pub async fn reject(
        &self,
        stage: &str,
        by: &str,
        reason: Option<String>,
    ) -> Result<(), PipelineError> {
        self.request(|reply| Command::Reject {
            stage: stage.to_string(),
            by: by.to_string(),
            reason,
            reply,
        })
        .await
    }

    /// Cancels running tasks and stops the run from starting anything else
    pub async fn abort(&self) -> Result<(), PipelineError> {
        self.request(|reply| Command::Abort { reply }).await
    }

    /// Waits until the run reaches a final state
    pub async fn wait(&self) -> RunReport {
        let mut report = self.report.clone();
        loop {
            if report.borrow_and_update().state.is_finished() {
                break;
            }
            if report.changed().await.is_err() {
                break;
            }
        }
        let last = report.borrow().clone();
        last
    }

    async fn request<F>(&self, make: F) -> Result<(), PipelineError>
    where
        F: FnOnce(oneshot::Sender<Result<(), PipelineError>>) -> Command,
    {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| PipelineError::RunFinished)?;
        response.await.map_err(|_| PipelineError::RunFinished)?
    }
}
