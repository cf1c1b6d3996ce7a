//! Error types for Newsboard
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` so handlers can return them directly.
//! Bodies are plain text carrying the underlying detail.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input (400)
    #[error("{0}")]
    Validation(String),

    /// File type outside the accepted image extensions (400)
    #[error("{0}")]
    UnsupportedMediaType(String),

    /// Request body exceeded the upload limit (400, reported by the multipart parser)
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Method not supported on this path (405)
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Database error (500)
    #[error("DB error: {0}")]
    Database(#[from] sqlx::Error),

    /// Upload store (filesystem) error (500)
    #[error("{0}")]
    Storage(String),

    /// Backend call exceeded its deadline (500)
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Wrap a database failure with a handler-specific prefix, keeping timeouts intact.
    pub fn database_context(self, context: &str) -> Self {
        match self {
            AppError::Database(e) => AppError::Storage(format!("{context}: {e}")),
            other => other,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::UnsupportedMediaType(_)
            | AppError::PayloadTooLarge(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Timeout(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::UnsupportedMediaType(_) => "unsupported_media_type",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::NotFound(_) => "not_found",
            AppError::MethodNotAllowed => "method_not_allowed",
            AppError::Database(_) => "database",
            AppError::Storage(_) => "storage",
            AppError::Timeout(_) => "timeout",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.error_type()]).inc();

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_bad_request() {
        for error in [
            AppError::Validation("Caption is required".to_string()),
            AppError::UnsupportedMediaType("Only JPG, PNG, WEBP images are allowed".to_string()),
            AppError::PayloadTooLarge("Invalid multipart form: too large".to_string()),
        ] {
            assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn timeout_is_internal_error() {
        let error = AppError::Timeout(std::time::Duration::from_secs(5));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn database_context_prefixes_message() {
        let error = AppError::Database(sqlx::Error::RowNotFound).database_context("DB query error");
        assert!(error.to_string().starts_with("DB query error: "));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn database_context_keeps_timeouts() {
        let error = AppError::Timeout(std::time::Duration::from_secs(5)).database_context("DB error");
        assert!(matches!(error, AppError::Timeout(_)));
    }

    #[test]
    fn response_body_is_plain_text() {
        let response = AppError::NotFound("Post not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
