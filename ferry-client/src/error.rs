//! Error types for the Ferry client
//!
//! The orchestrator answers errors with `{ "error": "..." }` and one of a few
//! status codes; each gets its own variant.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The orchestrator could not be reached
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// 400: invalid definition or version
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// 404: unknown run, stage or task
    #[error("Not found: {0}")]
    NotFound(String),

    /// 409: gate not awaiting a decision, or run already finished
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other non-success status
    #[error("Orchestrator error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// The body did not match the expected shape
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl ClientError {
    /// Maps an error response onto its variant
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::BAD_REQUEST => Self::Invalid(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::CONFLICT => Self::Conflict(message),
            _ => Self::Server {
                status: status.as_u16(),
                message,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The request was refused for the run's current state
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
