use piecework_core::types::DbId;
use piecework_core::worker::Worker;
use sqlx::PgExecutor;

use crate::models::assignment::Assignment;

/// Column list for `assignments` queries.
pub(crate) const COLUMNS: &str =
    "id, task_id, assigned_to, completed, answers, created_at, updated_at, expires_at";

/// Read access to assignments. Creation, completion, and deletion go
/// through the allocation engine so they stay inside its locking
/// discipline.
pub struct AssignmentRepo;

impl AssignmentRepo {
    pub async fn find_by_id(
        ex: impl PgExecutor<'_>,
        assignment_id: DbId,
    ) -> Result<Option<Assignment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assignments WHERE id = $1");
        sqlx::query_as::<_, Assignment>(&query)
            .bind(assignment_id)
            .fetch_optional(ex)
            .await
    }

    /// A worker's unfinished assignments in active, published batches,
    /// the "abandoned work in progress" list on the dashboard.
    pub async fn incomplete_for_worker(
        ex: impl PgExecutor<'_>,
        worker: Worker,
    ) -> Result<Vec<Assignment>, sqlx::Error> {
        let Some(user_id) = worker.user_id() else {
            // Anonymous sessions have no durable identity to look up.
            return Ok(Vec::new());
        };
        let query = "\
            SELECT a.id, a.task_id, a.assigned_to, a.completed, a.answers, \
                   a.created_at, a.updated_at, a.expires_at \
            FROM assignments a \
            JOIN tasks t ON t.id = a.task_id \
            JOIN batches b ON b.id = t.batch_id \
            JOIN projects p ON p.id = b.project_id \
            WHERE a.assigned_to = $1 AND a.completed = FALSE \
              AND b.active = TRUE AND p.active = TRUE \
            ORDER BY a.id";
        sqlx::query_as::<_, Assignment>(query)
            .bind(user_id)
            .fetch_all(ex)
            .await
    }

    /// Completed assignments on one task, for invariant checks and
    /// redundancy accounting.
    pub async fn completed_count_for_task(
        ex: impl PgExecutor<'_>,
        task_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM assignments WHERE task_id = $1 AND completed = TRUE",
        )
        .bind(task_id)
        .fetch_one(ex)
        .await?;
        Ok(count)
    }
}
