//! Approval DTOs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveStage {
    pub by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectStage {
    pub by: String,
    #[serde(default)]
    pub reason: Option<String>,
}
