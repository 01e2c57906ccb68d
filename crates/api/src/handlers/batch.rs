//! Handlers for the `/batches` resource: the worker dashboard and batch
//! creation from a multipart CSV upload.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use piecework_core::csv_input::parse_batch_csv;
use piecework_core::error::CoreError;
use piecework_core::types::DbId;
use piecework_db::models::assignment::Assignment;
use piecework_db::models::batch::{Batch, BatchListing, CreateBatch};
use piecework_db::queries;
use piecework_db::repositories::{AssignmentRepo, BatchRepo, ProjectRepo};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthUser, AuthWorker};
use crate::response::DataResponse;
use crate::state::AppState;

/// Dashboard payload: batches with work remaining for this worker, plus
/// their own unfinished assignments so abandoned work can be resumed.
#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub batches: Vec<BatchListing>,
    pub abandoned_assignments: Vec<Assignment>,
}

/// GET /api/v1/batches
pub async fn dashboard(
    State(state): State<AppState>,
    AuthWorker(worker): AuthWorker,
) -> AppResult<Json<DataResponse<Dashboard>>> {
    let batches = queries::list_available_batches(&state.pool, worker).await?;
    let abandoned_assignments = AssignmentRepo::incomplete_for_worker(&state.pool, worker).await?;
    Ok(Json(DataResponse {
        data: Dashboard {
            batches,
            abandoned_assignments,
        },
    }))
}

/// GET /api/v1/batches/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Batch>> {
    let batch = BatchRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Batch",
            id,
        }))?;
    Ok(Json(batch))
}

/// Response for a successful CSV upload.
#[derive(Debug, Serialize)]
pub struct BatchCreated {
    pub batch: Batch,
    pub tasks_created: usize,
    /// CSV header fields not used by the template. Accepted, but worth
    /// surfacing to the uploader.
    pub extra_fields: Vec<String>,
}

/// POST /api/v1/projects/{project_id}/batches
///
/// Multipart form: a required `csv_file` part plus optional text parts
/// (`name`, `assignments_per_task`, `allotted_assignment_time`,
/// `login_required`, `custom_permissions`, `published`). Unset fields
/// copy the project's values; `name` defaults to the CSV filename.
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<DbId>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<BatchCreated>>)> {
    let project = ProjectRepo::find_by_id(&state.pool, project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: project_id,
        }))?;

    let mut input = CreateBatch::default();
    let mut csv_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "csv_file" => {
                input.filename = field.file_name().unwrap_or("batch.csv").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                csv_bytes = Some(data.to_vec());
            }
            "name" => input.name = read_text(field).await?,
            "assignments_per_task" => {
                input.assignments_per_task = Some(parse_field(field, "assignments_per_task").await?)
            }
            "allotted_assignment_time" => {
                input.allotted_assignment_time =
                    Some(parse_field(field, "allotted_assignment_time").await?)
            }
            "login_required" => {
                input.login_required = Some(parse_field(field, "login_required").await?)
            }
            "custom_permissions" => {
                input.custom_permissions = Some(parse_field(field, "custom_permissions").await?)
            }
            "published" => input.published = Some(parse_field(field, "published").await?),
            other => {
                return Err(AppError::BadRequest(format!(
                    "Unexpected form field: {other}"
                )))
            }
        }
    }

    let csv_bytes = csv_bytes
        .ok_or_else(|| AppError::BadRequest("Missing csv_file part in upload".to_string()))?;
    if input.name.is_empty() {
        input.name = input.filename.clone();
    }

    let parsed = parse_batch_csv(&csv_bytes, &project.fieldname_set())?;
    let (batch, tasks_created) =
        BatchRepo::create_with_tasks(&state.pool, &project, Some(user.user_id), &input, &parsed)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: BatchCreated {
                batch,
                tasks_created,
                extra_fields: parsed.extra_fields,
            },
        }),
    ))
}

/// DELETE /api/v1/batches/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let deleted = BatchRepo::delete(&state.pool, id).await?;
    if deleted {
        tracing::info!(batch_id = id, user_id = user.user_id, "Deleted batch");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Batch",
            id,
        }))
    }
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

async fn parse_field<T: std::str::FromStr>(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> AppResult<T> {
    let text = read_text(field).await?;
    text.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid value for {name}: {text}")))
}
