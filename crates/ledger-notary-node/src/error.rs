//! # API Error Types
//!
//! Maps ledger errors to HTTP status codes and a uniform JSON body:
//!
//! ```json
//! {"error": {"code": "NOT_FOUND", "message": "transfer not found: ..."}}
//! ```
//!
//! Error responses never carry a signed envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ledger_notary::LedgerError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    /// 404.
    #[error("{0}")]
    NotFound(String),

    /// Malformed path parameter (400).
    #[error("{0}")]
    BadRequest(String),

    /// Well-formed request with invalid content (422).
    #[error("{0}")]
    Validation(String),

    /// The transfer has no debit from the named account (422).
    #[error("{0}")]
    UnknownDebit(String),

    /// Debits without authorization block execution (422).
    #[error("{0}")]
    UnauthorizedDebits(String),

    /// The record already exists (409).
    #[error("{0}")]
    AlreadyExists(String),

    /// The transfer's state does not allow the operation (409).
    #[error("{0}")]
    InvalidState(String),

    /// Lost a concurrent transition (409).
    #[error("{0}")]
    Conflict(String),

    /// The store is unreachable or timed out (503).
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Anything else (500). Logged, never returned to the client.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::UnknownDebit(_) => (StatusCode::UNPROCESSABLE_ENTITY, "UNKNOWN_DEBIT"),
            Self::UnauthorizedDebits(_) => (StatusCode::UNPROCESSABLE_ENTITY, "UNAUTHORIZED_DEBITS"),
            Self::AlreadyExists(_) => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
            Self::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "internal server error");
                "an internal error occurred".to_string()
            }
            Self::ServiceUnavailable(detail) => {
                tracing::warn!(error = %detail, "store unavailable");
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::NotFound(_) | LedgerError::AccountNotFound(_) => Self::NotFound(message),
            LedgerError::AlreadyExists(_) => Self::AlreadyExists(message),
            LedgerError::Conflict { .. } => Self::Conflict(message),
            LedgerError::InvalidState { .. } => Self::InvalidState(message),
            LedgerError::UnknownDebit { .. } => Self::UnknownDebit(message),
            LedgerError::Unauthorized { .. } => Self::UnauthorizedDebits(message),
            LedgerError::Validation(_) => Self::Validation(message),
            LedgerError::StoreUnavailable(_) => Self::ServiceUnavailable(message),
            LedgerError::Receipt(_) | LedgerError::Store(_) => Self::Internal(message),
        }
    }
}
