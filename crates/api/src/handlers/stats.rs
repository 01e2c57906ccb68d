//! Aggregate statistics handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use piecework_core::error::CoreError;
use piecework_core::stats::format_seconds;
use piecework_core::types::{DbId, Timestamp};
use piecework_db::queries::{self, AggregateStats, WorkerBatchStat};
use piecework_db::repositories::{BatchRepo, ProjectRepo};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/batches/{id}/stats
pub async fn batch_stats(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<AggregateStats>>> {
    BatchRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Batch",
            id,
        }))?;
    let stats = queries::batch_stats(&state.pool, id).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/projects/{id}/stats
pub async fn project_stats(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<AggregateStats>>> {
    ProjectRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))?;
    let stats = queries::project_stats(&state.pool, id).await?;
    Ok(Json(DataResponse { data: stats }))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsWindow {
    /// Inclusive lower bound on submission time (RFC 3339).
    pub start: Option<Timestamp>,
    /// Inclusive upper bound on submission time (RFC 3339).
    pub end: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
pub struct WorkerStats {
    pub total_completed: i64,
    pub total_elapsed_seconds: i64,
    /// Human-readable total, e.g. `"3h 20m"`.
    pub total_elapsed: String,
    pub batches: Vec<WorkerBatchStat>,
}

/// GET /api/v1/users/{id}/stats?start=...&end=...
///
/// Workers may only see their own numbers; admins may see anyone's.
pub async fn worker_stats(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Query(window): Query<StatsWindow>,
) -> AppResult<Json<DataResponse<WorkerStats>>> {
    if user.user_id != id && !user.admin {
        return Err(AppError::Core(CoreError::Forbidden(
            "You may only view your own statistics".into(),
        )));
    }

    let batches = queries::worker_stats(&state.pool, id, window.start, window.end).await?;
    let total_completed = batches.iter().map(|b| b.completed).sum();
    let total_elapsed_seconds = batches.iter().map(|b| b.elapsed_seconds).sum();

    Ok(Json(DataResponse {
        data: WorkerStats {
            total_completed,
            total_elapsed_seconds,
            total_elapsed: format_seconds(total_elapsed_seconds),
            batches,
        },
    }))
}
