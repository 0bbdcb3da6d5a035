//! HTTP mapping for database failures.
//!
//! Database-layer failures become 503 and anything else 500. The body keeps
//! the shape `{"detail": {"error", "type", "message", "database_connected"}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dbprobe_db::DbError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// `try_connect()` failed; carries that attempt's diagnostic.
    #[error("Database connection failed")]
    ConnectionUnavailable { diagnostic: Option<String> },

    #[error("Database operation failed: {0}")]
    Database(#[from] DbError),
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    error: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    message: String,
    database_connected: bool,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ConnectionUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(e) if e.is_database_error() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> ErrorDetail {
        let (error, kind, message) = match self {
            Self::ConnectionUnavailable { diagnostic } => (
                "Database connection failed",
                "Connection Error",
                diagnostic
                    .clone()
                    .unwrap_or_else(|| "Failed to establish database connection".into()),
            ),
            Self::Database(e) if e.is_database_error() => {
                ("Database operation failed", "PostgreSQL Error", e.to_string())
            }
            Self::Database(e) => ("Database test failed", "Internal Server Error", e.to_string()),
        };

        ErrorDetail {
            error,
            kind,
            message,
            database_connected: false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::error!(status = status.as_u16(), error = %self, "Request failed");

        let body = ErrorResponse {
            detail: self.detail(),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
