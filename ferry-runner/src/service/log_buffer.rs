//! Log buffer service
//!
//! Collects task output while a run is in progress so it can be read live,
//! before the task's result exists. Each task keeps at most a fixed number of
//! lines; the oldest are dropped first.

use ferry_core::domain::log::LogEntry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// Service for per-task log buffers
pub trait LogBufferService: Send + Sync {
    /// Appends an entry to a task's log
    fn add_entry(&self, task: &str, entry: LogEntry);

    /// Everything captured for a task so far, or `None` if it never logged
    fn entries(&self, task: &str) -> Option<Vec<LogEntry>>;
}

const DEFAULT_LINE_LIMIT: usize = 10_000;

/// In-memory implementation of LogBufferService
///
/// Uses `Arc<Mutex<..>>` so clones share one buffer across tasks.
#[derive(Clone)]
pub struct InMemoryLogBuffer {
    buffer: Arc<Mutex<HashMap<String, VecDeque<LogEntry>>>>,
    line_limit: usize,
}

impl Default for InMemoryLogBuffer {
    fn default() -> Self {
        Self::with_line_limit(DEFAULT_LINE_LIMIT)
    }
}

impl InMemoryLogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_limit(line_limit: usize) -> Self {
        Self {
            buffer: Arc::default(),
            line_limit: line_limit.max(1),
        }
    }
}

impl LogBufferService for InMemoryLogBuffer {
    fn add_entry(&self, task: &str, entry: LogEntry) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let lines = buffer.entry(task.to_string()).or_default();
        if lines.len() == self.line_limit {
            lines.pop_front();
        }
        lines.push_back(entry);
    }

    fn entries(&self, task: &str) -> Option<Vec<LogEntry>> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.get(task).map(|lines| lines.iter().cloned().collect())
    }
}
