//! Error types for the resume parsing API provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Resume API provider errors
#[derive(Error, Debug)]
pub enum ResumeApiError {
    /// API request returned a non-success status
    #[error("Resume API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Parse task does not exist
    #[error("Parse task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Connector misconfigured
    #[error("Invalid connector configuration: {0}")]
    InvalidConfig(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for resume API operations
pub type Result<T> = std::result::Result<T, ResumeApiError>;

impl From<ResumeApiError> for BridgeError {
    fn from(error: ResumeApiError) -> Self {
        match error {
            ResumeApiError::ApiError {
                status_code,
                message,
            } => BridgeError::Rejected {
                status: status_code,
                message,
            },
            ResumeApiError::TaskNotFound { task_id } => BridgeError::Rejected {
                status: 404,
                message: format!("Parse task not found: {}", task_id),
            },
            ResumeApiError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            ResumeApiError::InvalidConfig(msg) => BridgeError::NotAvailable(msg),
            ResumeApiError::BridgeError(e) => e,
        }
    }
}
