use piecework_core::csv_input::ParsedCsv;
use piecework_core::error::CoreError;
use piecework_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::error::DbResult;
use crate::models::batch::{Batch, CreateBatch};
use crate::models::project::Project;

/// Column list for `batches` queries.
const COLUMNS: &str = "\
    id, project_id, name, filename, assignments_per_task, allotted_assignment_time, \
    active, published, completed, login_required, custom_permissions, \
    created_by, created_at, updated_at";

/// CRUD for batches, including the all-or-nothing CSV ingest.
pub struct BatchRepo;

impl BatchRepo {
    /// Create a batch and all of its tasks from a validated CSV in one
    /// transaction: either the batch lands with every task, or nothing
    /// is persisted.
    ///
    /// Unset `input` fields copy the project's values. When the batch
    /// ends up with custom permissions, the project's user grants are
    /// copied so existing access carries over.
    pub async fn create_with_tasks(
        pool: &PgPool,
        project: &Project,
        creator: Option<DbId>,
        input: &CreateBatch,
        csv: &ParsedCsv,
    ) -> DbResult<(Batch, usize)> {
        let assignments_per_task = input
            .assignments_per_task
            .unwrap_or(project.assignments_per_task);
        let login_required = input.login_required.unwrap_or(project.login_required);
        let custom_permissions = input
            .custom_permissions
            .unwrap_or(project.custom_permissions);

        if assignments_per_task < 1 {
            return Err(CoreError::Validation(
                "Assignments per Task must be at least 1".into(),
            )
            .into());
        }
        if !login_required && assignments_per_task != 1 {
            return Err(CoreError::Validation(
                "When login is not required to access a Batch, \
                 the number of Assignments per Task must be 1"
                    .into(),
            )
            .into());
        }

        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO batches \
                 (project_id, name, filename, assignments_per_task, \
                  allotted_assignment_time, published, login_required, \
                  custom_permissions, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        let mut batch = sqlx::query_as::<_, Batch>(&query)
            .bind(project.id)
            .bind(&input.name)
            .bind(&input.filename)
            .bind(assignments_per_task)
            .bind(
                input
                    .allotted_assignment_time
                    .unwrap_or(project.allotted_assignment_time),
            )
            .bind(input.published.unwrap_or(true))
            .bind(login_required)
            .bind(custom_permissions)
            .bind(creator)
            .fetch_one(&mut *tx)
            .await?;

        let mut num_created = 0usize;
        for row in &csv.rows {
            let input_fields: serde_json::Map<String, serde_json::Value> = row
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            sqlx::query("INSERT INTO tasks (batch_id, input_fields) VALUES ($1, $2)")
                .bind(batch.id)
                .bind(serde_json::Value::Object(input_fields))
                .execute(&mut *tx)
                .await?;
            num_created += 1;
        }

        if custom_permissions {
            sqlx::query(
                "INSERT INTO batch_permissions (batch_id, user_id) \
                 SELECT $1, user_id FROM project_permissions WHERE project_id = $2 \
                 ON CONFLICT DO NOTHING",
            )
            .bind(batch.id)
            .bind(project.id)
            .execute(&mut *tx)
            .await?;
        }

        // A header-only upload creates no tasks; the batch is born
        // complete and must never appear on the dashboard.
        Self::sync_completed(&mut *tx, batch.id).await?;
        batch.completed = num_created == 0;

        tx.commit().await?;

        tracing::info!(
            batch_id = batch.id,
            batch_name = %batch.name,
            num_created,
            "Created tasks for batch",
        );

        Ok((batch, num_created))
    }

    pub async fn find_by_id(
        ex: impl PgExecutor<'_>,
        batch_id: DbId,
    ) -> Result<Option<Batch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM batches WHERE id = $1");
        sqlx::query_as::<_, Batch>(&query)
            .bind(batch_id)
            .fetch_optional(ex)
            .await
    }

    pub async fn list_for_project(
        ex: impl PgExecutor<'_>,
        project_id: DbId,
    ) -> Result<Vec<Batch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM batches WHERE project_id = $1 ORDER BY id");
        sqlx::query_as::<_, Batch>(&query)
            .bind(project_id)
            .fetch_all(ex)
            .await
    }

    /// Recompute the derived `completed` flag: true iff the batch has no
    /// unfinished task. Writes only when the value changes.
    pub async fn sync_completed(
        ex: impl PgExecutor<'_>,
        batch_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE batches b \
             SET completed = t.done, updated_at = NOW() \
             FROM (SELECT NOT EXISTS ( \
                       SELECT 1 FROM tasks \
                       WHERE batch_id = $1 AND completed = FALSE \
                   ) AS done) t \
             WHERE b.id = $1 AND b.completed IS DISTINCT FROM t.done",
        )
        .bind(batch_id)
        .execute(ex)
        .await?;
        Ok(())
    }

    /// Hard delete. Cascades to tasks and assignments.
    pub async fn delete(ex: impl PgExecutor<'_>, batch_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM batches WHERE id = $1")
            .bind(batch_id)
            .execute(ex)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
