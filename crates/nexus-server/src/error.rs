//! HTTP error type for the Nexus server.
//!
//! Maps domain errors from `nexus-core` and `nexus-storage` into HTTP
//! responses. Every response carries a JSON body with a machine-readable
//! `error` code and a human-readable `message`. Internal detail is logged,
//! never returned.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use nexus_core::{CryptoError, PasswordError, SessionError};
use nexus_storage::StorageError;

/// Message for any login failure: unknown account, wrong password or
/// deactivated account.
pub const INVALID_LOGIN: &str = "incorrect username or password";

/// Message for any bearer token failure.
pub const INVALID_SESSION: &str = "could not validate credentials";

/// Application-level error returned from HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Authentication failed. Answered with `WWW-Authenticate: Bearer`.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// The target does not exist or belongs to another account.
    #[error("{0}")]
    NotFound(String),

    /// Malformed input, invalid reference, uniqueness or referential conflict.
    #[error("{0}")]
    BadRequest(String),

    /// A stored secret could not be decrypted with the configured key.
    #[error("stored secret could not be decrypted: {0}")]
    Decryption(CryptoError),

    /// Anything else. The detail goes to the log only.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.to_owned()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Decryption(err) => {
                tracing::error!(error = %err, "stored secret could not be decrypted");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "decryption_failed",
                    "the stored secret could not be decrypted; check the ENCRYPTION_KEY"
                        .to_owned(),
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_owned(),
                )
            }
        };

        let mut response = (
            status,
            axum::Json(ErrorBody {
                error: error_type,
                message,
            }),
        )
            .into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::NotFound(err.to_string()),
            StorageError::InvalidReference { .. }
            | StorageError::Conflict { .. }
            | StorageError::InUse { .. } => Self::BadRequest(err.to_string()),
            StorageError::Open { .. }
            | StorageError::Query { .. }
            | StorageError::Transaction { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKey { .. } | CryptoError::Encryption { .. } => {
                Self::Internal(err.to_string())
            }
            CryptoError::Encoding
            | CryptoError::CiphertextTooShort { .. }
            | CryptoError::Decryption
            | CryptoError::Utf8 => Self::Decryption(err),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidToken => Self::Unauthorized(INVALID_SESSION),
            SessionError::Signing { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    /// Only field paths and rule codes reach the message. The rejected
    /// values stay out, since they may be passwords or secrets.
    fn from(err: validator::ValidationErrors) -> Self {
        let mut failures = Vec::new();
        collect_failures("", &err, &mut failures);
        failures.sort();
        Self::BadRequest(format!("invalid input: {}", failures.join("; ")))
    }
}

fn collect_failures(prefix: &str, errors: &validator::ValidationErrors, out: &mut Vec<String>) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let codes: Vec<&str> = list.iter().map(|e| &*e.code).collect();
                out.push(format!("{path}: {}", codes.join(", ")));
            }
            ValidationErrorsKind::Struct(nested) => collect_failures(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_failures(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}
