//! Approval Service
//!
//! Resolution of approval gates across runs.

use ferry_core::domain::approval::ApprovalGate;
use ferry_core::dto::approval::{ApproveStage, RejectStage};
use uuid::Uuid;

use crate::repository::RunRepository;
use crate::service::run::{Result, find_run};

/// Every gate currently awaiting a decision, oldest first
pub async fn list_pending(runs: &RunRepository) -> Vec<ApprovalGate> {
    let mut gates: Vec<_> = runs
        .list_active()
        .await
        .iter()
        .flat_map(|h| h.snapshot().pending_gates().cloned().collect::<Vec<_>>())
        .collect();
    gates.sort_by_key(|g| g.requested_at);
    gates
}

pub async fn approve(runs: &RunRepository, id: Uuid, stage: &str, req: ApproveStage) -> Result<()> {
    let handle = find_run(runs, id).await?;
    handle.approve(stage, &req.by).await?;

    tracing::info!("Stage '{}' of run {} approved by {}", stage, id, req.by);
    Ok(())
}

pub async fn reject(runs: &RunRepository, id: Uuid, stage: &str, req: RejectStage) -> Result<()> {
    let handle = find_run(runs, id).await?;
    handle.reject(stage, &req.by, req.reason).await?;

    tracing::info!("Stage '{}' of run {} rejected by {}", stage, id, req.by);
    Ok(())
}
