//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::error_catalog::ErrorCode;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and to the response
/// envelope `{"error": true, "message": ..., "code": ...}`.
///
/// # Error Categories
///
/// - **Input**: `Validation`, `UnsupportedCurrencyPair`
/// - **Identity**: `Unauthorized`, `Unverified`, `Forbidden`
/// - **Resources**: `NotFound`, `TransactionNotFound`, `WalletNotFound`, `Conflict`
/// - **Ledger**: `InsufficientFunds`, `InvalidTransition`
/// - **Webhooks**: `SignatureInvalid`, `DuplicateEvent`
/// - **Infrastructure**: `Database`, `Internal`
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Unique violations surface as 409, everything else as an opaque 500.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Request body or parameters are invalid.
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Credentials are valid but the email address is not verified yet.
    #[error("Please verify your email address before logging in")]
    Unverified,

    /// Valid token without the required role, or a blocked account.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Wallet not found")]
    WalletNotFound,

    /// Duplicate email, duplicate reference.
    #[error("{0}")]
    Conflict(String),

    /// The state machine refused the requested transition.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A debit would take a wallet below zero.
    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Unsupported currency pair: {0}")]
    UnsupportedCurrencyPair(String),

    /// Webhook signature header missing or HMAC mismatch.
    #[error("Invalid webhook signature")]
    SignatureInvalid,

    /// Webhook already processed; reported to the processor as success.
    #[error("already_processed")]
    DuplicateEvent,

    #[error("Too many requests")]
    RateLimited,

    /// Any other fault (processor, mail relay, serialization).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a database error is a unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }

    fn parts(&self) -> (StatusCode, Option<ErrorCode>, String) {
        match self {
            AppError::Database(_) if self.is_unique_violation() => (
                StatusCode::CONFLICT,
                None,
                "Resource already exists".to_string(),
            ),
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Some(ErrorCode::InternalServerError),
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Some(ErrorCode::InternalServerError),
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                Some(ErrorCode::InvalidAmounts).filter(|_| msg.contains("Amount")),
                msg.clone(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, None, msg.clone()),
            AppError::Unverified => (StatusCode::UNAUTHORIZED, None, self.to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, None, msg.clone()),
            AppError::NotFound(_) | AppError::WalletNotFound => {
                (StatusCode::NOT_FOUND, None, self.to_string())
            }
            AppError::TransactionNotFound => (
                StatusCode::NOT_FOUND,
                Some(ErrorCode::TransactionNotFound),
                self.to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, None, msg.clone()),
            AppError::InvalidTransition(_) => (StatusCode::CONFLICT, None, self.to_string()),
            AppError::InsufficientFunds => (
                StatusCode::BAD_REQUEST,
                Some(ErrorCode::InsufficientFunds),
                self.to_string(),
            ),
            AppError::UnsupportedCurrencyPair(_) => {
                (StatusCode::BAD_REQUEST, None, self.to_string())
            }
            AppError::SignatureInvalid => (StatusCode::BAD_REQUEST, None, self.to_string()),
            AppError::DuplicateEvent => (StatusCode::OK, None, self.to_string()),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                Some(ErrorCode::RateLimit),
                self.to_string(),
            ),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": true,
///   "message": "Insufficient funds",
///   "code": "INSUFFICIENT_FUNDS",
///   "details": { "code": "...", "title": "...", "description": "...", "action": "..." }
/// }
/// ```
///
/// `DuplicateEvent` is the only variant rendered with `"error": false`: the
/// processor must see a 200 so it stops redelivering.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if matches!(self, AppError::DuplicateEvent) {
            return (
                status,
                Json(json!({ "error": false, "message": message })),
            )
                .into_response();
        }

        let body = match code {
            Some(code) => json!({
                "error": true,
                "message": message,
                "code": code.as_str(),
                "details": code.info(),
            }),
            None => json!({
                "error": true,
                "message": message,
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        let cases = [
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("User".into()), StatusCode::NOT_FOUND),
            (AppError::TransactionNotFound, StatusCode::NOT_FOUND),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT),
            (AppError::InvalidTransition("x".into()), StatusCode::CONFLICT),
            (AppError::InsufficientFunds, StatusCode::BAD_REQUEST),
            (AppError::SignatureInvalid, StatusCode::BAD_REQUEST),
            (AppError::DuplicateEvent, StatusCode::OK),
            (AppError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn insufficient_funds_carries_catalogue_code() {
        let response = AppError::InsufficientFunds.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], true);
        assert_eq!(value["code"], "INSUFFICIENT_FUNDS");
        assert_eq!(value["details"]["code"], "INSUFFICIENT_FUNDS");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = AppError::Internal("password=hunter2".into()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn row_not_found_is_not_a_unique_violation() {
        assert!(!AppError::Database(sqlx::Error::RowNotFound).is_unique_violation());
    }
}
