//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Business rule violation, detected before any mutation
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage failure. Nothing was committed; the whole operation may be
    /// retried only when the store says so (unavailable or unresolved conflict).
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Missing required header: {0}")]
    MissingHeader(String),
}

impl AppError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Persistence(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    pub retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            AppError::Domain(domain_err) => match domain_err {
                DomainError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
                DomainError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "account_not_found"),
                DomainError::ReceiverNotFound(_) => (StatusCode::NOT_FOUND, "receiver_not_found"),
                DomainError::SelfTransferNotAllowed => {
                    (StatusCode::BAD_REQUEST, "self_transfer_not_allowed")
                }
                DomainError::InsufficientFunds { .. } => {
                    (StatusCode::BAD_REQUEST, "insufficient_funds")
                }
                DomainError::DailyLimitExceeded { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "daily_limit_exceeded")
                }
                DomainError::EntryNotFound(_) => (StatusCode::NOT_FOUND, "transaction_not_found"),
                DomainError::EntryFinalized { .. } => {
                    tracing::error!("Ledger invariant violated: {}", domain_err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                }
            },

            AppError::MissingHeader(_) => (StatusCode::BAD_REQUEST, "missing_header"),

            AppError::Persistence(e) if e.is_retryable() => {
                tracing::error!("Persistence error: {:?}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "persistence_error")
            }
            AppError::Persistence(e) => {
                tracing::error!("Storage fault: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        // Storage internals are logged above, not echoed to callers.
        let error = match &self {
            AppError::Persistence(e) if e.is_retryable() => {
                "Persistence error: please retry".to_string()
            }
            AppError::Persistence(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            retryable: self.is_retryable(),
        };

        (status, Json(body)).into_response()
    }
}
