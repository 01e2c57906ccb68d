//! Operational maintenance endpoints.

use axum::extract::State;
use axum::Json;
use piecework_core::error::CoreError;
use piecework_db::allocation;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ExpireResult {
    pub deleted: u64,
}

/// POST /api/v1/maintenance/expire (admin only)
///
/// Delete every incomplete assignment past its expiry. The same sweep
/// the `expire-assignments` binary runs on a schedule.
pub async fn expire(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DataResponse<ExpireResult>>> {
    if !user.admin {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only admins may run the expiry sweep".into(),
        )));
    }
    let deleted = allocation::expire_abandoned(&state.pool).await?;
    Ok(Json(DataResponse {
        data: ExpireResult { deleted },
    }))
}
