//! API error types with HTTP response mapping.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed request, rejected before reaching a service.
    #[error("{0}")]
    BadRequest(String),

    /// Error raised by a domain service.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match err {
        DomainError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        DomainError::Validation(msg) | DomainError::Conflict(msg) => {
            (StatusCode::BAD_REQUEST, msg)
        }
        DomainError::Unauthenticated => (
            StatusCode::UNAUTHORIZED,
            DomainError::Unauthenticated.to_string(),
        ),
        DomainError::Internal(inner) => {
            tracing::error!(error = %inner, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}
