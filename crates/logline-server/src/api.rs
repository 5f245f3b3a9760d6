//! Shared API error type and request-validation helpers.
//!
//! Every failure a handler can produce flows through [`ApiError`], which
//! renders the uniform `{error, message}` body. Store errors map onto the
//! taxonomy via `From`; validation helpers produce `ValidationFailed`
//! errors before any store call.

use crate::AppState;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use logline_store::{Level, StoreError};
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Internal detail is logged, never returned to the caller.
        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(detail = detail.as_str(), "internal server error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": message,
        }));

        (self.status(), body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::Forbidden(msg) => Self::Forbidden(msg),
            StoreError::InvalidRange(msg) => Self::Validation(msg),
            StoreError::Database(e) => Self::Internal(format!("database error: {e}")),
            StoreError::Serialization(e) => Self::Internal(format!("serialization error: {e}")),
        }
    }
}

/// Runs a store operation on the blocking pool with a pooled connection.
pub(crate) async fn run_blocking<T, F>(state: Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = state
            .pool
            .get()
            .map_err(|e| ApiError::Internal(format!("db connection failed: {e}")))?;
        f(&conn)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("task join error: {e}")))?
}

/// Parses a path segment as a positive application id.
pub(crate) fn parse_app_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            ApiError::Validation("application id must be a positive integer".to_string())
        })
}

/// Parses an RFC 3339 query parameter, normalizing to UTC.
pub(crate) fn parse_timestamp(name: &str, raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::Validation(format!("{name} must be an RFC 3339 timestamp")))
}

/// Parses a severity level query parameter.
pub(crate) fn parse_level(raw: &str) -> Result<Level, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::Validation(format!(
            "invalid level: {raw}. Expected one of: DEBUG, INFO, WARNING, ERROR, CRITICAL"
        ))
    })
}
