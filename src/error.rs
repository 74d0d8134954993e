//! Error taxonomy shared by every route module.
//!
//! Handlers return `Result<_, ApiError>`; the `IntoResponse` impl maps each
//! variant to a status code and a stable JSON body so clients can branch on
//! `code` instead of parsing messages.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A required field is missing or a field value is malformed.
    #[error("{0}")]
    Validation(String),

    /// A section `data` payload does not match the schema for its kind.
    #[error("{0}")]
    Schema(String),

    #[error("{0}")]
    NotFound(String),

    /// Unique-key collision (slug, email).
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// An upstream dependency (file host, weather vendor) could not be reached.
    #[error("{0}")]
    RemoteUnavailable(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Server-side failure unrelated to the database (hashing, token signing).
    #[error("internal error")]
    Internal(String),

    /// No pool was initialized at startup.
    #[error("database not available")]
    PoolUnavailable,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Schema(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::RemoteUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::PoolUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Schema(_) => "schema",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::RemoteUnavailable(_) => "remote_unavailable",
            ApiError::Database(_) => "database",
            ApiError::Internal(_) => "internal",
            ApiError::PoolUnavailable => "database_unavailable",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal failures are logged server-side; the client gets a generic
        // message rather than driver internals.
        let message = match &self {
            ApiError::Database(e) => {
                tracing::error!("database error: {}", e);
                "Database error".to_string()
            }
            ApiError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                "Internal server error".to_string()
            }
            ApiError::PoolUnavailable => "Database not available".to_string(),
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                code: self.code(),
            }),
        )
            .into_response()
    }
}

/// Translates a unique-constraint violation into `Conflict`; everything else
/// stays `Database`.
pub fn map_unique_violation(e: sqlx::Error, conflict_msg: &str) -> ApiError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return ApiError::Conflict(conflict_msg.to_string());
        }
    }
    ApiError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Schema("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::RemoteUnavailable("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::PoolUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_error_body_hides_database_details() {
        let err = ApiError::Database(sqlx::Error::RowNotFound);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ApiError::Validation("x".into()).code(), "validation");
        assert_eq!(ApiError::Schema("x".into()).code(), "schema");
        assert_eq!(ApiError::Conflict("x".into()).code(), "conflict");
    }
}
