//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ferry_core::definition::DefinitionError;
use ferry_runner::PipelineError;

use crate::service::run_service::RunError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<DefinitionError> for ApiError {
    fn from(err: DefinitionError) -> Self {
        match err {
            DefinitionError::Io { .. } => ApiError::InternalError(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Definition(err) => err.into(),
            PipelineError::EmptyVersion => ApiError::BadRequest(err.to_string()),
            PipelineError::UnknownStage(_) => ApiError::NotFound(err.to_string()),
            PipelineError::NotAwaitingApproval { .. } | PipelineError::RunFinished => {
                ApiError::Conflict(err.to_string())
            }
        }
    }
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::NotFound(_) | RunError::LogsNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            RunError::Definition(err) => err.into(),
            RunError::Pipeline(err) => err.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
