//! Handlers for the task work loop: preview, accept, submit, return,
//! and skip.
//!
//! Skip state is session data owned by the caller: requests carry it in,
//! responses echo it back (possibly mutated). The server never persists
//! it.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use piecework_core::error::CoreError;
use piecework_core::session::SkipState;
use piecework_core::template::populate;
use piecework_core::types::DbId;
use piecework_db::allocation;
use piecework_db::models::assignment::Assignment;
use piecework_db::models::task::Task;
use piecework_db::permissions::can_view_project;
use piecework_db::repositories::{BatchRepo, ProjectRepo, TaskRepo};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthWorker;
use crate::response::DataResponse;
use crate::state::AppState;

/// A task ready for display: its inputs substituted into the project's
/// HTML template.
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub task_id: DbId,
    pub batch_id: DbId,
    pub project_id: DbId,
    pub completed: bool,
    pub html: String,
    pub input_fields: HashMap<String, String>,
}

async fn build_task_view(state: &AppState, task: &Task) -> AppResult<TaskView> {
    let batch = BatchRepo::find_by_id(&state.pool, task.batch_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Batch",
            id: task.batch_id,
        }))?;
    let project = ProjectRepo::find_by_id(&state.pool, batch.project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: batch.project_id,
        }))?;

    let inputs: Vec<(String, String)> = task.input_map().into_iter().collect();
    Ok(TaskView {
        task_id: task.id,
        batch_id: batch.id,
        project_id: project.id,
        completed: task.completed,
        html: populate(&project.html_template, &inputs),
        input_fields: task.input_map(),
    })
}

/// Request body carrying the caller-owned skip state.
#[derive(Debug, Default, Deserialize)]
pub struct SessionBody {
    #[serde(default)]
    pub session: SkipState,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub assignment: Assignment,
    pub task: TaskView,
    /// True when every remaining task had been skipped; the skip list
    /// for this batch has been cleared.
    pub only_skipped_remain: bool,
    pub session: SkipState,
}

/// POST /api/v1/batches/{id}/accept
///
/// Claim the next available task. Responds 404 when nothing in the
/// batch is available to this worker.
pub async fn accept_next(
    State(state): State<AppState>,
    AuthWorker(worker): AuthWorker,
    Path(batch_id): Path<DbId>,
    Json(body): Json<SessionBody>,
) -> AppResult<Json<DataResponse<AcceptResponse>>> {
    let mut session = body.session;
    let accepted = allocation::accept_next(&state.pool, batch_id, worker, &mut session)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Available Task",
                id: batch_id,
            })
        })?;

    let task = TaskRepo::find_by_id(&state.pool, accepted.assignment.task_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Task",
            id: accepted.assignment.task_id,
        }))?;
    let view = build_task_view(&state, &task).await?;

    Ok(Json(DataResponse {
        data: AcceptResponse {
            assignment: accepted.assignment,
            task: view,
            only_skipped_remain: accepted.only_skipped_remain,
            session,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    /// JSON-encoded [`SkipState`], as handed back by earlier responses.
    pub skip: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub task: TaskView,
    pub only_skipped_remain: bool,
    pub session: SkipState,
}

/// GET /api/v1/batches/{id}/tasks/next?skip=...
///
/// Read-only preview of the task `accept_next` would claim. Takes no
/// locks and creates nothing; two workers may preview the same task.
pub async fn preview_next(
    State(state): State<AppState>,
    AuthWorker(worker): AuthWorker,
    Path(batch_id): Path<DbId>,
    Query(params): Query<PreviewParams>,
) -> AppResult<Json<DataResponse<PreviewResponse>>> {
    let mut session: SkipState = match params.skip.as_deref() {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| AppError::BadRequest(format!("Invalid skip state: {e}")))?,
        None => SkipState::default(),
    };

    let (task, only_skipped_remain) =
        allocation::preview_next(&state.pool, batch_id, worker, &mut session)
            .await?
            .ok_or_else(|| {
                AppError::Core(CoreError::NotFound {
                    entity: "Available Task",
                    id: batch_id,
                })
            })?;
    let view = build_task_view(&state, &task).await?;

    Ok(Json(DataResponse {
        data: PreviewResponse {
            task: view,
            only_skipped_remain,
            session,
        },
    }))
}

/// POST /api/v1/batches/{batch_id}/tasks/{task_id}/accept
pub async fn accept_specific(
    State(state): State<AppState>,
    AuthWorker(worker): AuthWorker,
    Path((batch_id, task_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<DataResponse<Assignment>>> {
    let assignment = allocation::accept_task(&state.pool, batch_id, task_id, worker).await?;
    Ok(Json(DataResponse { data: assignment }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub answers: serde_json::Map<String, serde_json::Value>,
}

/// POST /api/v1/tasks/{task_id}/assignments/{assignment_id}/submit
pub async fn submit(
    State(state): State<AppState>,
    AuthWorker(worker): AuthWorker,
    Path((task_id, assignment_id)): Path<(DbId, DbId)>,
    Json(body): Json<SubmitBody>,
) -> AppResult<Json<DataResponse<Assignment>>> {
    let assignment =
        allocation::submit(&state.pool, task_id, assignment_id, worker, body.answers).await?;
    Ok(Json(DataResponse { data: assignment }))
}

/// POST /api/v1/tasks/{task_id}/assignments/{assignment_id}/return
pub async fn return_assignment(
    State(state): State<AppState>,
    AuthWorker(worker): AuthWorker,
    Path((task_id, assignment_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    allocation::return_assignment(&state.pool, task_id, assignment_id, worker).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/batches/{batch_id}/tasks/{task_id}/skip
///
/// Pure session mutation: records the task in the caller's skip list and
/// echoes the updated state. Nothing is written server-side.
pub async fn skip(
    State(state): State<AppState>,
    Path((batch_id, task_id)): Path<(DbId, DbId)>,
    Json(body): Json<SessionBody>,
) -> AppResult<Json<DataResponse<SkipState>>> {
    let task = TaskRepo::find_by_id(&state.pool, task_id)
        .await?
        .filter(|t| t.batch_id == batch_id)
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Task",
            id: task_id,
        }))?;

    let mut session = body.session;
    session.skip(batch_id, task.id);
    Ok(Json(DataResponse { data: session }))
}

/// GET /api/v1/tasks/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    AuthWorker(worker): AuthWorker,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<TaskView>>> {
    let task = TaskRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Task", id }))?;

    let batch = BatchRepo::find_by_id(&state.pool, task.batch_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Batch",
            id: task.batch_id,
        }))?;
    let project = ProjectRepo::find_by_id(&state.pool, batch.project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: batch.project_id,
        }))?;
    if !can_view_project(&state.pool, worker, &project).await? {
        return Err(AppError::Core(CoreError::Forbidden(
            "You do not have permission to view this Task".into(),
        )));
    }

    let view = build_task_view(&state, &task).await?;
    Ok(Json(DataResponse { data: view }))
}
