//! Log DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::log::LogEntry;

/// Captured log of one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogs {
    pub run_id: Uuid,
    pub task: String,
    pub entries: Vec<LogEntry>,
}
