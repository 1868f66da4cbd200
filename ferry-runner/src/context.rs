//! Execution context for a single task
//!
//! Every line a task writes, and every system message about it, goes through
//! the context: secrets are redacted first, then the line is appended to the
//! run's log buffer under the task's name.

use ferry_core::domain::log::{LogEntry, LogLevel, LogStream};
use ferry_core::domain::secret::SecretTable;
use std::sync::Arc;

use crate::service::LogBufferService;

pub struct TaskContext {
    task: String,
    secrets: Arc<SecretTable>,
    sink: Arc<dyn LogBufferService>,
}

impl TaskContext {
    pub fn new(
        task: impl Into<String>,
        secrets: Arc<SecretTable>,
        sink: Arc<dyn LogBufferService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            task: task.into(),
            secrets,
            sink,
        })
    }

    fn add(&self, level: LogLevel, stream: LogStream, message: &str) {
        let message = self.secrets.redact(message);
        self.sink
            .add_entry(&self.task, LogEntry::now(level, stream, message));
    }

    pub fn stdout_line(&self, line: &str) {
        self.add(LogLevel::Info, LogStream::Stdout, line);
    }

    pub fn stderr_line(&self, line: &str) {
        self.add(LogLevel::Warning, LogStream::Stderr, line);
    }

    pub fn log_info(&self, message: &str) {
        self.add(LogLevel::Info, LogStream::System, message);
    }

    pub fn log_warning(&self, message: &str) {
        self.add(LogLevel::Warning, LogStream::System, message);
    }

    pub fn log_error(&self, message: &str) {
        self.add(LogLevel::Error, LogStream::System, message);
    }

    /// Snapshot of the task's log in arrival order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.sink.entries(&self.task).unwrap_or_default()
    }
}
