//! Core error types.
//!
//! Every variant maps to a stable machine-readable code and an HTTP
//! status.  The enum implements [`axum::response::IntoResponse`] so
//! handlers can simply return `Err(DropError::NotFound)`; the body is a
//! JSON object `{"code": "...", "message": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::metadata::store::MetaError;
use crate::storage::backend::StorageError;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Errors raised by the drop engine and surfaced over HTTP.
#[derive(Debug, Error)]
pub enum DropError {
    /// The slug is unknown, or the backing blob is missing.
    #[error("drop not found")]
    NotFound,

    /// No credentials were presented for an operation that needs them.
    #[error("authentication required")]
    AuthRequired,

    /// Credentials were presented but do not grant this operation.
    #[error("access denied")]
    Forbidden,

    /// The drop is passphrase-protected and none was supplied.
    #[error("passphrase required")]
    PasswordRequired,

    /// The supplied passphrase does not verify.
    #[error("invalid passphrase")]
    PasswordInvalid,

    /// A drop with the requested slug already exists.
    #[error("slug already taken: {slug}")]
    SlugTaken { slug: String },

    /// Auto-generation retries were exhausted without finding a free slug.
    #[error("could not allocate a unique slug")]
    SlugExhausted,

    /// A user-supplied slug failed the lexical rules.
    #[error("invalid slug: {reason}")]
    SlugInvalid { reason: String },

    /// The upload exceeded the configured maximum size.
    #[error("upload exceeds the maximum allowed size of {limit} bytes")]
    SizeLimitExceeded { limit: u64 },

    /// Any other input-shape violation.
    #[error("{message}")]
    Validation { message: String },

    /// A concurrent mutation race the store rejected.
    #[error("{message}")]
    Conflict { message: String },

    /// I/O failure in the blob store.
    #[error("storage failure")]
    Storage(#[source] StorageError),

    /// Catch-all for unexpected internal errors.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl DropError {
    /// Convenience constructor for validation failures.
    pub fn validation(message: impl Into<String>) -> Self {
        DropError::Validation {
            message: message.into(),
        }
    }

    /// Return the stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            DropError::NotFound => "NOT_FOUND",
            DropError::AuthRequired => "AUTH_REQUIRED",
            DropError::Forbidden => "FORBIDDEN",
            DropError::PasswordRequired => "PASSWORD_REQUIRED",
            DropError::PasswordInvalid => "PASSWORD_INVALID",
            DropError::SlugTaken { .. } => "SLUG_TAKEN",
            DropError::SlugExhausted => "SLUG_EXHAUSTED",
            DropError::SlugInvalid { .. } => "SLUG_INVALID",
            DropError::SizeLimitExceeded { .. } => "SIZE_LIMIT_EXCEEDED",
            DropError::Validation { .. } => "VALIDATION_ERROR",
            DropError::Conflict { .. } => "CONFLICT",
            DropError::Storage(_) => "STORAGE_ERROR",
            DropError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DropError::NotFound => StatusCode::NOT_FOUND,
            DropError::AuthRequired => StatusCode::UNAUTHORIZED,
            DropError::Forbidden => StatusCode::FORBIDDEN,
            DropError::PasswordRequired => StatusCode::UNAUTHORIZED,
            DropError::PasswordInvalid => StatusCode::UNAUTHORIZED,
            DropError::SlugTaken { .. } => StatusCode::CONFLICT,
            DropError::SlugExhausted => StatusCode::INTERNAL_SERVER_ERROR,
            DropError::SlugInvalid { .. } => StatusCode::BAD_REQUEST,
            DropError::SizeLimitExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DropError::Validation { .. } => StatusCode::BAD_REQUEST,
            DropError::Conflict { .. } => StatusCode::CONFLICT,
            DropError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DropError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for DropError {
    fn from(err: StorageError) -> Self {
        match err {
            // A missing blob is a 404 at the API; the call sites log the
            // corruption before converting.
            StorageError::NotFound(_) => DropError::NotFound,
            other => DropError::Storage(other),
        }
    }
}

impl From<MetaError> for DropError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::SlugConflict(slug) => DropError::SlugTaken { slug },
            MetaError::NotFound => DropError::NotFound,
            MetaError::Db(e) => DropError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl IntoResponse for DropError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the logs, not in the response body.
        let message = match &self {
            DropError::Storage(source) => {
                tracing::error!(error = %source, "storage failure");
                "storage failure".to_string()
            }
            DropError::Internal(source) => {
                tracing::error!(error = %source, "internal error");
                "an unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "code": self.code(),
                "message": message,
            })),
        )
            .into_response()
    }
}
