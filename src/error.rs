//! Ledger error types
//!
//! One enum covers the account store, the ledger engine and the identity layer.
//! Every variant maps onto a coarse [`ErrorKind`] that callers branch on; the
//! variant itself carries the detail used for logging.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// SQLSTATE codes that mean "try again", not "broken".
const DEADLOCK_DETECTED: &str = "40P01";
const SERIALIZATION_FAILURE: &str = "40001";
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Coarse error taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Unauthorized,
    InsufficientBalance,
    NotFound,
    Conflict,
    Validation,
    Internal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Identity ===
    #[error("Wrong username or password")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    // === Ledger preconditions ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Cannot transfer coins to yourself")]
    SelfTransfer,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    Conflict(String),

    // === Infrastructure ===
    #[error("Store busy (lock contention), retry: {0}")]
    StoreBusy(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unauthorized | LedgerError::InvalidToken => ErrorKind::Unauthorized,
            LedgerError::InsufficientBalance => ErrorKind::InsufficientBalance,
            LedgerError::RecipientNotFound(_)
            | LedgerError::ItemNotFound(_)
            | LedgerError::AccountNotFound(_) => ErrorKind::NotFound,
            LedgerError::Conflict(_) => ErrorKind::Conflict,
            LedgerError::InvalidCredentials(_)
            | LedgerError::InvalidIdentity(_)
            | LedgerError::InvalidAmount
            | LedgerError::SelfTransfer => ErrorKind::Validation,
            LedgerError::StoreBusy(_) | LedgerError::Database(_) | LedgerError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Unauthorized => "UNAUTHORIZED",
            LedgerError::InvalidToken => "INVALID_TOKEN",
            LedgerError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            LedgerError::InvalidIdentity(_) => "INVALID_IDENTITY",
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::SelfTransfer => "SELF_TRANSFER",
            LedgerError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            LedgerError::RecipientNotFound(_) => "RECIPIENT_NOT_FOUND",
            LedgerError::ItemNotFound(_) => "ITEM_NOT_FOUND",
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::Conflict(_) => "CONFLICT",
            LedgerError::StoreBusy(_) => "STORE_BUSY",
            LedgerError::Database(_) => "DATABASE_ERROR",
            LedgerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status suggestion for the transport layer
    pub fn http_status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Validation | ErrorKind::InsufficientBalance => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => match self {
                LedgerError::StoreBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }

    /// Lock contention: the transaction was rolled back and nothing committed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StoreBusy(_))
    }

    /// Message safe to hand to a caller. Internal detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal if self.is_retryable() => {
                "Service busy, check history before retrying".to_string()
            }
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && let Some(code) = db_err.code()
            && matches!(
                code.as_ref(),
                DEADLOCK_DETECTED | SERIALIZATION_FAILURE | LOCK_NOT_AVAILABLE
            )
        {
            return LedgerError::StoreBusy(db_err.message().to_string());
        }
        match e {
            sqlx::Error::PoolTimedOut => LedgerError::StoreBusy("connection pool timed out".into()),
            other => LedgerError::Database(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for LedgerError {
    fn from(e: tokio::task::JoinError) -> Self {
        LedgerError::Internal(format!("blocking task failed: {}", e))
    }
}

/// JSON body for error responses
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub kind: ErrorKind,
    pub msg: String,
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code(),
            kind: self.kind(),
            msg: self.public_message(),
        };
        (self.http_status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(LedgerError::InvalidToken.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            LedgerError::RecipientNotFound("bob".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(LedgerError::SelfTransfer.kind(), ErrorKind::Validation);
        assert_eq!(LedgerError::StoreBusy("x".into()).kind(), ErrorKind::Internal);
        assert_eq!(LedgerError::Conflict("bob".into()).kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LedgerError::InsufficientBalance.code(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(LedgerError::ItemNotFound("cup".into()).code(), "ITEM_NOT_FOUND");
        assert_eq!(LedgerError::Unauthorized.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(LedgerError::Unauthorized.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(LedgerError::InvalidAmount.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            LedgerError::AccountNotFound("a".into()).http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LedgerError::StoreBusy("deadlock".into()).http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            LedgerError::Database("boom".into()).http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = LedgerError::Database("relation \"accounts\" does not exist".into());
        assert_eq!(err.public_message(), "Internal server error");
        assert!(!LedgerError::Database("x".into()).is_retryable());

        let busy = LedgerError::StoreBusy("deadlock detected".into());
        assert!(busy.is_retryable());
        assert!(!busy.public_message().contains("deadlock"));

        assert_eq!(
            LedgerError::InsufficientBalance.public_message(),
            "Insufficient balance"
        );
    }

    #[test]
    fn test_pool_timeout_is_retryable() {
        let err: LedgerError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_retryable());

        let err: LedgerError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, LedgerError::Database(_)));
    }
}
