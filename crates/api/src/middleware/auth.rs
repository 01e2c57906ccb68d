//! JWT-based authentication extractors for Axum handlers.
//!
//! Two flavors, because most worker-facing endpoints are open to
//! anonymous workers when the batch allows it:
//!
//! - [`AuthUser`] rejects with 401 when no valid Bearer token is present.
//! - [`AuthWorker`] maps a missing Authorization header to
//!   [`Worker::Anonymous`] and still rejects malformed or expired tokens,
//!   so a worker with a stale session gets a clear 401 instead of
//!   silently losing their identity.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use piecework_core::error::CoreError;
use piecework_core::types::DbId;
use piecework_core::worker::Worker;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT Bearer token in the
/// `Authorization` header. Rejects anonymous requests.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
    /// Whether the token grants admin rights.
    pub admin: bool,
}

impl AuthUser {
    pub fn worker(&self) -> Worker {
        Worker::Authenticated(self.user_id)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        parse_bearer(auth_header, state)
    }
}

/// Worker identity for endpoints that serve anonymous workers too.
#[derive(Debug, Clone, Copy)]
pub struct AuthWorker(pub Worker);

impl FromRequestParts<AppState> for AuthWorker {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(AuthWorker(Worker::Anonymous));
        };

        let user = parse_bearer(auth_header, state)?;
        Ok(AuthWorker(user.worker()))
    }
}

fn parse_bearer(auth_header: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>".into(),
        ))
    })?;

    let claims = validate_token(token, &state.config.jwt)
        .map_err(|_| AppError::Core(CoreError::Unauthorized("Invalid or expired token".into())))?;

    Ok(AuthUser {
        user_id: claims.sub,
        admin: claims.admin,
    })
}
