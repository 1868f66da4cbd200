//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline definitions.

use axum::Json;
use ferry_core::dto::pipeline::{PipelinePlan, ValidatePipeline};

use crate::api::error::ApiResult;
use crate::service::pipeline_service;

/// POST /api/pipeline/validate
/// Validate a definition and return its execution plan
pub async fn validate_pipeline(Json(req): Json<ValidatePipeline>) -> ApiResult<Json<PipelinePlan>> {
    tracing::debug!("Validating pipeline definition");

    let plan = pipeline_service::validate_pipeline(&req)?;

    Ok(Json(plan))
}
