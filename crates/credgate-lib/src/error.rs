// crates/credgate-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::storage::StoreError;
use crate::validation::Violation;

/// Credential lifecycle errors. Every variant is a recoverable, caller-reported outcome.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("An account with this username or email already exists")]
    DuplicateAccount,

    /// Identical for unknown usernames and wrong passwords. `attempts_remaining`
    /// is for server-side bookkeeping and never rendered.
    #[error("Invalid username or password")]
    InvalidCredentials { attempts_remaining: Option<u32> },

    #[error("Account is locked, try again in {seconds_remaining} seconds")]
    AccountLocked { seconds_remaining: u64 },

    #[error("Password rejected: {}", join_violations(.0))]
    PasswordRejected(Vec<Violation>),

    #[error("Invalid or expired reset token")]
    InvalidOrExpiredToken,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for credential operations
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::DuplicateAccount => StatusCode::CONFLICT,
            AuthError::InvalidCredentials { .. } => StatusCode::UNAUTHORIZED,
            AuthError::AccountLocked { .. } => StatusCode::LOCKED,
            AuthError::PasswordRejected(_) | AuthError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            },
            AuthError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            AuthError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::DuplicateAccount => "ACCT_001",
            AuthError::InvalidCredentials { .. } => "AUTH_001",
            AuthError::AccountLocked { .. } => "AUTH_002",
            AuthError::PasswordRejected(_) => "PWD_001",
            AuthError::InvalidOrExpiredToken => "RESET_001",
            AuthError::StorageUnavailable(_) => "STORE_001",
            AuthError::InvalidInput(_) => "VAL_001",
            AuthError::Internal(_) => "INT_001",
        }
    }

    /// Get a message that is safe to show to an end user.
    ///
    /// Policy violations are listed in full so they can all be fixed at once;
    /// storage and internal details are not.
    pub fn sanitized_message(&self) -> String {
        match self {
            AuthError::StorageUnavailable(_) => {
                "Service temporarily unavailable, please try again later".to_string()
            },
            AuthError::Internal(_) => "An internal server error occurred".to_string(),
            AuthError::InvalidInput(_) => "Invalid input provided".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.sanitized_message();

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => AuthError::DuplicateAccount,
            other => AuthError::StorageUnavailable(other.to_string()),
        }
    }
}
