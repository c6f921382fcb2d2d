//! Unified API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::api::models::ErrorResponse;
use crate::error::LedgerError;

/// API-specific error type.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Invalid request parameters.
    BadRequest(String),
    /// An upstream service (indexer, node, price API) failed.
    Upstream(String),
    /// The registry task is not running.
    Unavailable(String),
    /// Internal server error.
    InternalError(String),
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Database operation failed.
    DatabaseError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Upstream(msg) => {
                error!(error = %msg, "Upstream failure in API handler");
                (StatusCode::BAD_GATEWAY, "upstream_error", msg)
            }
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
            Self::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_exceeded",
                "Rate limit exceeded. Please try again later.".to_string(),
            ),
            Self::DatabaseError(msg) => {
                error!(error = %msg, "Database error in API handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database operation failed".to_string(),
                )
            }
            Self::InternalError(msg) => {
                error!(error = %msg, "Internal error in API handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
        });

        (status, body).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DecodingError { message, .. } => Self::BadRequest(message),
            LedgerError::DatabaseError { message, .. } => Self::DatabaseError(message),
            LedgerError::IndexerError { .. } | LedgerError::RpcError { .. } => {
                Self::Upstream(err.to_string())
            }
            LedgerError::RegistryError { message } => Self::Unavailable(message),
            _ => Self::InternalError(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (LedgerError::decoding("Invalid address: 0x1", None), StatusCode::BAD_REQUEST),
            (LedgerError::database("locked", None), StatusCode::INTERNAL_SERVER_ERROR),
            (LedgerError::indexer("HTTP 503", None), StatusCode::BAD_GATEWAY),
            (LedgerError::rpc("timeout", None), StatusCode::BAD_GATEWAY),
            (LedgerError::registry("gone"), StatusCode::SERVICE_UNAVAILABLE),
            (LedgerError::config("bad", None), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_rate_limited() {
        assert_eq!(
            ApiError::RateLimitExceeded.into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
