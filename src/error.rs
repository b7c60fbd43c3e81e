//! Domain error types for the Rally insights server.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use actix_web::{HttpResponse, ResponseError};
use std::fmt;

use crate::services::llm::LlmError;
use crate::services::rally::RallyError;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A collaborator is missing its configuration
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Rally request failed
    #[error("Rally error: {0}")]
    Rally(String),

    /// LLM request failed
    #[error("LLM error: {0}")]
    Llm(String),

    /// Uploaded payload is too large
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_code, response_message) = match self {
            AppError::NotFound(_) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
                self.to_string(),
            ),
            AppError::InvalidInput(_) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                self.to_string(),
            ),
            AppError::NotConfigured(_) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "NOT_CONFIGURED",
                self.to_string(),
            ),
            AppError::Rally(err_str) => {
                tracing::error!("Rally error: {}", err_str);
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "RALLY_ERROR",
                    self.to_string(),
                )
            }
            AppError::Llm(err_str) => {
                tracing::error!("LLM error: {}", err_str);
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    self.to_string(),
                )
            }
            AppError::PayloadTooLarge(_) => (
                actix_web::http::StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                self.to_string(),
            ),
            AppError::Internal(err_str) => {
                tracing::error!("Internal error: {}", err_str);
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: error_code.to_string(),
            message: response_message,
        })
    }
}

/// Error response body matching OpenAPI schema.
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<RallyError> for AppError {
    fn from(err: RallyError) -> Self {
        match err {
            RallyError::NotConfigured => {
                AppError::NotConfigured("Rally endpoint and API key must be set".to_string())
            }
            RallyError::NotFound(what) => AppError::NotFound(what),
            other => AppError::Rally(other.to_string()),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured(what) => AppError::NotConfigured(what),
            other => AppError::Llm(other.to_string()),
        }
    }
}
