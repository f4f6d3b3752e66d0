//! Unified error types for the re-indexing engine.
//!
//! Error codes:
//! - SESSION_001-004: Session lifecycle errors
//! - VALID_001: Validation errors
//! - DB_001: Store errors
//! - JOB_001: Job execution errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Session lifecycle error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorCode {
    /// SESSION_001: Another session is already active
    Conflict,
    /// SESSION_002: Session is already in a terminal state
    NotActive,
    /// SESSION_003: Session not found
    NotFound,
    /// SESSION_004: Session was modified by another writer
    StaleWrite,
}

impl SessionErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict => "SESSION_001",
            Self::NotActive => "SESSION_002",
            Self::NotFound => "SESSION_003",
            Self::StaleWrite => "SESSION_004",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Conflict => 409,
            Self::NotActive => 409,
            Self::NotFound => 404,
            Self::StaleWrite => 409,
        }
    }
}

/// Store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    /// DB_001: Store operation failed
    StoreFailed,
}

impl DbErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreFailed => "DB_001",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        500
    }
}

/// Unified error type for the re-indexing engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Session lifecycle error with code.
    #[error("[{code}] {message}")]
    Session {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Store error with code.
    #[error("[{code}] {message}")]
    Database {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Every attempt at a job failed.
    #[error("[JOB_001] job [{start}, {end}] failed after {attempts} attempts: {last_error}")]
    JobExhausted {
        start: i64,
        end: i64,
        attempts: u32,
        last_error: String,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid event type: {0}")]
    InvalidEventType(String),

    #[error("indexer error: {0}")]
    Indexer(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a session lifecycle error.
    pub fn session(code: SessionErrorCode, msg: impl Into<String>) -> Self {
        Self::Session {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Another session is `PENDING` or `IN_PROGRESS`.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::session(SessionErrorCode::Conflict, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::session(SessionErrorCode::NotFound, msg)
    }

    pub fn not_active(msg: impl Into<String>) -> Self {
        Self::session(SessionErrorCode::NotActive, msg)
    }

    pub fn stale_write(msg: impl Into<String>) -> Self {
        Self::session(SessionErrorCode::StaleWrite, msg)
    }

    /// Create a store error.
    pub fn database(code: DbErrorCode, msg: impl Into<String>) -> Self {
        Self::Database {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Shorthand for [`DbErrorCode::StoreFailed`].
    pub fn store(msg: impl Into<String>) -> Self {
        Self::database(DbErrorCode::StoreFailed, msg)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn indexer(msg: impl Into<String>) -> Self {
        Self::Indexer(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this is the "another session is active" error.
    pub fn is_conflict(&self) -> bool {
        self.error_code() == Some(SessionErrorCode::Conflict.code())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Session { http_status, .. } => *http_status,
            Self::Database { http_status, .. } => *http_status,
            Self::JobExhausted { .. } => 500,
            Self::Validation(_) => 400,
            Self::Serialization(_) => 400,
            Self::InvalidEventType(_) => 400,
            Self::Indexer(_) => 502,
            Self::Unauthorized(_) => 401,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Session { code, .. } => Some(code),
            Self::Database { code, .. } => Some(code),
            Self::JobExhausted { .. } => Some("JOB_001"),
            _ => None,
        }
    }
}
