use piecework_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::task::Task;

/// Column list for `tasks` queries.
const COLUMNS: &str = "id, batch_id, completed, input_fields";

/// Read access to tasks. Tasks are only created in bulk by
/// `BatchRepo::create_with_tasks` and only mutated by the allocation
/// engine's completion check.
pub struct TaskRepo;

impl TaskRepo {
    pub async fn find_by_id(
        ex: impl PgExecutor<'_>,
        task_id: DbId,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .fetch_optional(ex)
            .await
    }

    /// All tasks of a batch in creation order, the one externally
    /// observable ordering.
    pub async fn list_for_batch(
        ex: impl PgExecutor<'_>,
        batch_id: DbId,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE batch_id = $1 ORDER BY id");
        sqlx::query_as::<_, Task>(&query)
            .bind(batch_id)
            .fetch_all(ex)
            .await
    }
}
