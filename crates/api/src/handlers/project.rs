//! Handlers for the `/projects` resource.
//!
//! Template validation happens here, before anything touches the
//! database: size limit, at least one response field, and the
//! login/redundancy rule.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use piecework_core::error::CoreError;
use piecework_core::template::{process_template, TemplateInfo};
use piecework_core::types::DbId;
use piecework_db::models::project::{CreateProject, Project, UpdateProject};
use piecework_db::permissions::can_view_project;
use piecework_db::repositories::ProjectRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthUser, AuthWorker};
use crate::state::AppState;

fn check_redundancy_rule(login_required: bool, assignments_per_task: i32) -> AppResult<()> {
    if assignments_per_task < 1 {
        return Err(AppError::Core(CoreError::Validation(
            "Assignments per Task must be at least 1".into(),
        )));
    }
    if !login_required && assignments_per_task != 1 {
        return Err(AppError::Core(CoreError::Validation(
            "When login is not required to access the Project, \
             the number of Assignments per Task must be 1"
                .into(),
        )));
    }
    Ok(())
}

/// POST /api/v1/projects
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateProject>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let info = process_template(&input.html_template, state.config.site.template_size_limit)?;
    check_redundancy_rule(
        input.login_required.unwrap_or(true),
        input.assignments_per_task.unwrap_or(1),
    )?;

    let project = ProjectRepo::create(&state.pool, Some(user.user_id), &input, &info).await?;
    tracing::info!(project_id = project.id, user_id = user.user_id, "Created project");
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/v1/projects
pub async fn list(State(state): State<AppState>, _user: AuthUser) -> AppResult<Json<Vec<Project>>> {
    let projects = ProjectRepo::list(&state.pool).await?;
    Ok(Json(projects))
}

/// GET /api/v1/projects/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    AuthWorker(worker): AuthWorker,
    Path(id): Path<DbId>,
) -> AppResult<Json<Project>> {
    let project = ProjectRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))?;
    if !can_view_project(&state.pool, worker, &project).await? {
        return Err(AppError::Core(CoreError::Forbidden(
            "You do not have permission to view this Project".into(),
        )));
    }
    Ok(Json(project))
}

/// PUT /api/v1/projects/{id}
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateProject>,
) -> AppResult<Json<Project>> {
    let existing = ProjectRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))?;

    // Validate against the merged values, not just the patch.
    check_redundancy_rule(
        input.login_required.unwrap_or(existing.login_required),
        input
            .assignments_per_task
            .unwrap_or(existing.assignments_per_task),
    )?;

    let info: Option<TemplateInfo> = match &input.html_template {
        Some(html) => Some(process_template(html, state.config.site.template_size_limit)?),
        None => None,
    };

    let project = ProjectRepo::update(&state.pool, id, Some(user.user_id), &input, info.as_ref())
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))?;
    Ok(Json(project))
}

/// DELETE /api/v1/projects/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let deleted = ProjectRepo::delete(&state.pool, id).await?;
    if deleted {
        tracing::info!(project_id = id, user_id = user.user_id, "Deleted project");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id,
        }))
    }
}
