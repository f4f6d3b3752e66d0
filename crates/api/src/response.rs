//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_connected: bool,
    pub scheduler_healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler_error: Option<String>,
    pub pending_jobs: u64,
}

/// Accepted abort request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortResponse {
    pub name: String,
    pub abort_requested: bool,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error with a stable code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "VALID_001", msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::UNAUTHORIZED, "AUTH_001", msg)
    }

    /// Code for failures that carry no code of their own.
    pub const INTERNAL_CODE: &'static str = "INTERNAL_001";

    pub fn validation(errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            response: ErrorResponse::new("Validation failed", "VALID_001").with_details(errors),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<engine_core::Error> for ApiError {
    fn from(err: engine_core::Error) -> Self {
        use engine_core::Error;

        match &err {
            Error::Session {
                code,
                message,
                http_status,
            }
            | Error::Database {
                code,
                message,
                http_status,
            } => {
                let status =
                    StatusCode::from_u16(*http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                ApiError::with_code(status, *code, message)
            }
            Error::Validation(msg) => ApiError::validation(vec![msg.clone()]),
            Error::InvalidEventType(_) | Error::Serialization(_) => {
                ApiError::bad_request(err.to_string())
            }
            Error::Unauthorized(msg) => ApiError::unauthorized(msg),
            _ => {
                let status = StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let code = err.error_code().unwrap_or(Self::INTERNAL_CODE);
                ApiError::with_code(status, code, err.to_string())
            }
        }
    }
}
