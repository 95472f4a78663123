//! HTTP surface for campus-registry
//!
//! Every handler resolves the caller from gateway headers, checks the role,
//! then parses the body. A missing identity is reported before a bad body.

pub mod attendance;
pub mod auth;
pub mod health;
pub mod timetable;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::error::RegistryError;
use crate::upsert::{Ack, Outcome};

pub use attendance::attendance_routes;
pub use auth::{require_role, AuthError};
pub use health::health_routes;
pub use timetable::timetable_routes;

/// Error returned by handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Registry(RegistryError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Registry(RegistryError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(e) => e.into_response(),
            ApiError::Registry(e) => e.into_response(),
        }
    }
}

/// Acknowledgment body of a successful write
#[derive(Debug, Clone, Serialize)]
pub struct AckResponse {
    pub id: String,
    pub outcome: Outcome,
    pub message: &'static str,
}

impl AckResponse {
    pub fn new(ack: Ack, message: &'static str) -> Self {
        Self {
            id: ack.id,
            outcome: ack.outcome,
            message,
        }
    }
}
