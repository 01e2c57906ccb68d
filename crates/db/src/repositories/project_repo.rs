use piecework_core::template::TemplateInfo;
use piecework_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::project::{CreateProject, Project, UpdateProject};

/// Column list for `projects` queries.
const COLUMNS: &str = "\
    id, name, filename, html_template, fieldnames, has_submit_button, \
    assignments_per_task, allotted_assignment_time, \
    login_required, custom_permissions, active, \
    created_by, updated_by, created_at, updated_at";

/// CRUD for projects. Template validation happens in the caller (the
/// handler runs `process_template` first); this repo persists the
/// derived `fieldnames`/`has_submit_button` alongside the template.
pub struct ProjectRepo;

impl ProjectRepo {
    pub async fn create(
        ex: impl PgExecutor<'_>,
        creator: Option<DbId>,
        input: &CreateProject,
        template: &TemplateInfo,
    ) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects \
                 (name, filename, html_template, fieldnames, has_submit_button, \
                  assignments_per_task, allotted_assignment_time, \
                  login_required, custom_permissions, active, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(&input.name)
            .bind(&input.filename)
            .bind(&input.html_template)
            .bind(fieldnames_json(template))
            .bind(template.has_submit_button)
            .bind(input.assignments_per_task.unwrap_or(1))
            .bind(input.allotted_assignment_time.unwrap_or(24))
            .bind(input.login_required.unwrap_or(true))
            .bind(input.custom_permissions.unwrap_or(false))
            .bind(input.active.unwrap_or(true))
            .bind(creator)
            .fetch_one(ex)
            .await
    }

    /// Update a project. `template` must be the re-derived info whenever
    /// `input.html_template` is set.
    pub async fn update(
        ex: impl PgExecutor<'_>,
        project_id: DbId,
        updater: Option<DbId>,
        input: &UpdateProject,
        template: Option<&TemplateInfo>,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET \
                 name = COALESCE($2, name), \
                 html_template = COALESCE($3, html_template), \
                 fieldnames = COALESCE($4, fieldnames), \
                 has_submit_button = COALESCE($5, has_submit_button), \
                 assignments_per_task = COALESCE($6, assignments_per_task), \
                 allotted_assignment_time = COALESCE($7, allotted_assignment_time), \
                 login_required = COALESCE($8, login_required), \
                 custom_permissions = COALESCE($9, custom_permissions), \
                 active = COALESCE($10, active), \
                 updated_by = $11, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(project_id)
            .bind(&input.name)
            .bind(&input.html_template)
            .bind(template.map(fieldnames_json))
            .bind(template.map(|t| t.has_submit_button))
            .bind(input.assignments_per_task)
            .bind(input.allotted_assignment_time)
            .bind(input.login_required)
            .bind(input.custom_permissions)
            .bind(input.active)
            .bind(updater)
            .fetch_optional(ex)
            .await
    }

    pub async fn find_by_id(
        ex: impl PgExecutor<'_>,
        project_id: DbId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(project_id)
            .fetch_optional(ex)
            .await
    }

    pub async fn list(ex: impl PgExecutor<'_>) -> Result<Vec<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects ORDER BY id DESC");
        sqlx::query_as::<_, Project>(&query).fetch_all(ex).await
    }

    /// Hard delete. Cascades to batches, tasks, and assignments.
    pub async fn delete(ex: impl PgExecutor<'_>, project_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(project_id)
            .execute(ex)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn fieldnames_json(template: &TemplateInfo) -> serde_json::Value {
    serde_json::Value::Array(
        template
            .fieldnames
            .iter()
            .map(|f| serde_json::Value::String(f.clone()))
            .collect(),
    )
}
