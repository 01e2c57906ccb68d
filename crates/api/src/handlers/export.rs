//! CSV download handlers: batch results, batch input, project results.

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use piecework_core::error::CoreError;
use piecework_core::export::{input_csv, results_csv, results_filename, LineTerminator};
use piecework_core::types::DbId;
use piecework_db::queries;
use piecework_db::repositories::{BatchRepo, ProjectRepo};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    /// `windows` (CRLF, default) or `unix` (LF).
    #[serde(default)]
    pub line_ending: LineTerminator,
}

fn csv_download(filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// GET /api/v1/batches/{id}/results?line_ending=unix|windows
pub async fn batch_results(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<DbId>,
    Query(params): Query<ExportParams>,
) -> AppResult<Response> {
    let batch = BatchRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Batch",
            id,
        }))?;

    let rows = queries::result_rows_for_batch(&state.pool, id).await?;
    let bytes = results_csv(&rows, params.line_ending)?;
    let filename = results_filename(batch.project_id, batch.id, &batch.filename);
    Ok(csv_download(&filename, bytes))
}

/// GET /api/v1/batches/{id}/input
///
/// The uploaded rows back out as CSV, one row per task regardless of
/// completion.
pub async fn batch_input(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<DbId>,
    Query(params): Query<ExportParams>,
) -> AppResult<Response> {
    let batch = BatchRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Batch",
            id,
        }))?;

    let tasks = queries::task_input_maps(&state.pool, id).await?;
    let bytes = input_csv(&tasks, params.line_ending)?;
    Ok(csv_download(&batch.filename, bytes))
}

/// GET /api/v1/projects/{id}/results
pub async fn project_results(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<DbId>,
    Query(params): Query<ExportParams>,
) -> AppResult<Response> {
    let project = ProjectRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))?;

    let rows = queries::result_rows_for_project(&state.pool, id).await?;
    let bytes = results_csv(&rows, params.line_ending)?;
    let filename = format!("Project-{}_results.csv", project.id);
    Ok(csv_download(&filename, bytes))
}
