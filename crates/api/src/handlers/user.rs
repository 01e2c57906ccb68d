//! Minimal worker-identity handlers.
//!
//! Credential storage and login live in the external identity provider;
//! these endpoints exist so JWT subjects resolve to rows the assignment
//! foreign keys can point at.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use piecework_core::error::CoreError;
use piecework_core::types::DbId;
use piecework_db::models::user::{CreateUser, User};
use piecework_db::repositories::UserRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// POST /api/v1/users (admin only)
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    if !user.admin {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only admins may register users".into(),
        )));
    }
    let created = UserRepo::create(&state.pool, &input).await?;
    tracing::info!(user_id = created.id, username = %created.username, "Registered user");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/users/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<User>> {
    if user.user_id != id && !user.admin {
        return Err(AppError::Core(CoreError::Forbidden(
            "You may only view your own profile".into(),
        )));
    }
    let found = UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "User", id }))?;
    Ok(Json(found))
}
