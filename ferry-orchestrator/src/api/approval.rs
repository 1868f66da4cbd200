//! Approval API Handlers
//!
//! HTTP endpoints for resolving approval gates.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use ferry_core::domain::approval::ApprovalGate;
use ferry_core::dto::approval::{ApproveStage, RejectStage};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::approval_service;

/// GET /api/approvals
/// List every gate awaiting a decision
pub async fn list_pending(State(state): State<AppState>) -> Json<Vec<ApprovalGate>> {
    Json(approval_service::list_pending(&state.runs).await)
}

/// POST /api/runs/{id}/stages/{stage}/approve
pub async fn approve_stage(
    State(state): State<AppState>,
    Path((id, stage)): Path<(Uuid, String)>,
    Json(req): Json<ApproveStage>,
) -> ApiResult<StatusCode> {
    approval_service::approve(&state.runs, id, &stage, req).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/runs/{id}/stages/{stage}/reject
pub async fn reject_stage(
    State(state): State<AppState>,
    Path((id, stage)): Path<(Uuid, String)>,
    Json(req): Json<RejectStage>,
) -> ApiResult<StatusCode> {
    approval_service::reject(&state.runs, id, &stage, req).await?;
    Ok(StatusCode::ACCEPTED)
}
