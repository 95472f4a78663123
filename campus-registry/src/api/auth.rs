//! Caller identity
//!
//! Sessions are validated upstream by the authenticating gateway, which
//! forwards the user id and role as headers. This module only turns those
//! headers into an [`Actor`] and enforces per-route role sets.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::warn;

use crate::error::ErrorBody;
use crate::identity::{Actor, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Authentication and authorization failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("{0}")]
    UnknownRole(String),

    #[error("role {role} may not {action}")]
    Forbidden { role: Role, action: &'static str },
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingHeader(_) | AuthError::UnknownRole(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        warn!("Access denied: {}", self);

        let code = match self {
            AuthError::Forbidden { .. } => "forbidden",
            _ => "unauthorized",
        };
        (self.status(), Json(ErrorBody::new(code, self.to_string()))).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?;
        let role = header(parts, USER_ROLE_HEADER)?;
        let role = role.parse::<Role>().map_err(AuthError::UnknownRole)?;

        Ok(Actor::new(user_id, role))
    }
}

fn header(parts: &Parts, name: &'static str) -> Result<String, AuthError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(AuthError::MissingHeader(name))
}

/// Reject `actor` unless it holds one of `allowed`
pub fn require_role(actor: &Actor, allowed: &[Role], action: &'static str) -> Result<(), AuthError> {
    if actor.has_any_role(allowed) {
        Ok(())
    } else {
        Err(AuthError::Forbidden {
            role: actor.role,
            action,
        })
    }
}
