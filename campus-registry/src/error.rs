//! Error types for campus-registry
//!
//! Client errors (`Validation`, `NotFound`) carry the violated precondition
//! back to the caller. Server errors are logged in full and reported with a
//! generic body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Main error type for campus-registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Malformed or missing required input
    #[error("{0}")]
    Validation(String),

    /// Referenced foreign entity absent
    #[error("{0}")]
    NotFound(String),

    /// Unique-key creation race that the single retry did not resolve
    #[error("Conflicting write on {0}")]
    Conflict(String),

    /// Connectivity or query failure in the persistence layer
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Request exceeded its time budget
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Any other failure that should not leak to the caller
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using RegistryError
pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, RegistryError::Validation(_) | RegistryError::NotFound(_))
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::Validation(_) => "validation_error",
            RegistryError::NotFound(_) => "not_found",
            RegistryError::Conflict(_)
            | RegistryError::Storage(_)
            | RegistryError::Timeout(_)
            | RegistryError::Internal(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::Conflict(_)
            | RegistryError::Storage(_)
            | RegistryError::Timeout(_)
            | RegistryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body sent to the caller; server errors never expose their cause
    pub fn body(&self) -> ErrorBody {
        if self.is_client_error() {
            ErrorBody::new(self.code(), self.to_string())
        } else {
            ErrorBody::server_error()
        }
    }
}

impl From<campus_common::Error> for RegistryError {
    fn from(err: campus_common::Error) -> Self {
        match err {
            campus_common::Error::InvalidInput(msg) => RegistryError::Validation(msg),
            campus_common::Error::Database(e) => RegistryError::Storage(e),
            other => RegistryError::Internal(other.to_string()),
        }
    }
}

/// JSON error body
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Error type identifier
    pub error: String,
    /// Human-readable message
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn server_error() -> Self {
        Self::new("server_error", "Server error")
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            warn!("Request rejected: {}", self);
        } else {
            error!("Request failed: {:?}", self);
        }

        (self.status(), Json(self.body())).into_response()
    }
}
