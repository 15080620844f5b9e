use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("username and password are required for {0}")]
    CredentialsMissing(String),

    #[error("unsupported backend kind: {0}")]
    UnsupportedBackend(String),

    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("liveness probe failed: {0}")]
    ProbeFailed(String),

    #[error("agent execution failed: {0}")]
    AgentExecution(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::CredentialsMissing(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("CREDENTIALS_MISSING", self.to_string()),
            ),
            AppError::UnsupportedBackend(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("UNSUPPORTED_BACKEND", self.to_string()),
            ),
            AppError::ConnectionNotFound(_) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("CONNECTION_NOT_FOUND", self.to_string()),
            ),
            AppError::ProbeFailed(_) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new("PROBE_FAILED", self.to_string()),
            ),
            AppError::AgentExecution(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("AGENT_EXECUTION_FAILED", self.to_string()),
            ),
            AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("STORAGE_ERROR", self.to_string()),
            ),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", self.to_string()),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", self.to_string()),
            ),
        };

        let body = Json(ErrorResponse { error: error_detail });

        (status, body).into_response()
    }
}

/// Convert anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Convert rusqlite::Error to AppError
impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status() {
        let error = AppError::ConnectionNotFound("abc".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let error = AppError::CredentialsMissing("postgresql".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_detail_creation() {
        let detail = ErrorDetail::new("TEST_CODE", "Test message");
        assert_eq!(detail.code, "TEST_CODE");
        assert_eq!(detail.message, "Test message");
    }

    #[test]
    fn test_error_message_carries_backend_kind() {
        let error = AppError::CredentialsMissing("mysql".to_string());
        assert!(error.to_string().contains("mysql"));
    }
}
