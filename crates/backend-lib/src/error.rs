// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("At least one participant is required")]
    EmptyParticipants,

    #[error("Call not found or already ended")]
    CallNotFound,

    #[error("You are not a participant in this call")]
    NotParticipant,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) | AppError::NotParticipant => StatusCode::FORBIDDEN,
            AppError::InvalidInput(_) | AppError::EmptyParticipants => StatusCode::BAD_REQUEST,
            AppError::CallNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "AUTH_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::EmptyParticipants => "VAL_002",
            AppError::CallNotFound => "CALL_001",
            AppError::NotParticipant => "CALL_002",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::Auth(_) => "Authentication failed".to_string(),
            AppError::InvalidInput(_) | AppError::EmptyParticipants => {
                "Invalid input provided".to_string()
            },
            AppError::CallNotFound => "Call not found or already ended".to_string(),
            AppError::NotParticipant => "You are not a participant in this call".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
            AppError::Io(_) => "Internal server error".to_string(),
            AppError::Json(_) => "Invalid request format".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<chatware_common::InvalidCallType> for AppError {
    fn from(err: chatware_common::InvalidCallType) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
