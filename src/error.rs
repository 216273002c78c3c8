//! HTTP error contract.
//!
//! All error responses share one body shape:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "video not found" } }
//! ```
//!
//! | Code | Status | Meaning |
//! |------|--------|---------|
//! | `bad_request` | 400 | Malformed or missing input, invalid identifier |
//! | `unauthorized` | 401 | Missing, invalid, or expired credentials |
//! | `forbidden` | 403 | Authenticated but not the owner of the entity |
//! | `not_found` | 404 | Referenced entity is absent |
//! | `conflict` | 409 | Uniqueness violation (duplicate user, playlist entry) |
//! | `media_error` | 500 | Media storage upload/delete failure |
//! | `internal` | 500 | Database or other server-side failure |
//!
//! Server-side errors are logged before the response is rendered.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::media::MediaError;

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// Error type returned by every handler and store operation.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status.as_u16(), self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, status = self.status.as_u16(), "{}", self.message);
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
pub fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

/// Constructs a 401 Unauthorized error.
pub fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

/// Constructs a 403 Forbidden error.
pub fn forbidden(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::FORBIDDEN, "forbidden", message)
}

/// Constructs a 404 Not Found error.
pub fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

/// Constructs a 409 Conflict error.
pub fn conflict(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::CONFLICT, "conflict", message)
}

/// Constructs a 500 error.
pub fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        internal(format!("database error: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        internal(format!("{:#}", err))
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "media_error", err.to_string())
    }
}

/// Maps a UNIQUE constraint violation to 409, anything else to 500.
pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => conflict(message),
        _ => err.into(),
    }
}
