//! The task allocation engine.
//!
//! Selects, locks, and hands out the next available task to a requesting
//! worker, tracks partial completion toward a per-task redundancy
//! target, expires abandoned claims, and honours the caller-owned
//! per-session skip list.
//!
//! Locking discipline: every claim or return opens a transaction and
//! takes `FOR UPDATE` row locks over the batch's unfinished tasks before
//! deciding, so concurrent accepts for the same batch serialize instead
//! of double-allocating. Plain `FOR UPDATE` rather than `SKIP LOCKED`:
//! a racing accept must wait and re-evaluate availability, not skip the
//! row, because a redundancy-N task legitimately admits several
//! claimants. The relational store is the sole source of truth; no
//! availability state is cached across requests.

use piecework_core::error::CoreError;
use piecework_core::session::SkipState;
use piecework_core::types::DbId;
use piecework_core::worker::Worker;
use sqlx::{PgConnection, PgPool};

use crate::error::DbResult;
use crate::models::assignment::Assignment;
use crate::models::batch::Batch;
use crate::models::task::Task;
use crate::permissions::can_work_on_batch;
use crate::repositories::{AssignmentRepo, BatchRepo, TaskRepo};

/// A successful claim, with the "only previously skipped tasks remain"
/// notice for the caller's UI.
#[derive(Debug)]
pub struct Accepted {
    pub assignment: Assignment,
    pub only_skipped_remain: bool,
}

/// Task ids in `batch` still available to `worker`, in ascending id
/// (creation) order.
///
/// Empty when the batch is completed, inactive, unpublished, its project
/// is inactive, or the permission gate denies the worker. Otherwise:
///
/// - redundancy 1: only tasks with no assignment at all, completed or
///   not. Single-assignment batches must not let two workers be
///   simultaneously mid-claim on one task;
/// - redundancy > 1: tasks where this worker holds no assignment and the
///   total assignment count is below the redundancy factor. The
///   already-assigned exclusion only applies to authenticated workers;
///   anonymous claims are not deduplicated against each other.
pub async fn available_task_ids(
    conn: &mut PgConnection,
    batch: &Batch,
    worker: Worker,
) -> Result<Vec<DbId>, sqlx::Error> {
    if batch.completed {
        return Ok(Vec::new());
    }
    let (project_active,): (bool,) = sqlx::query_as("SELECT active FROM projects WHERE id = $1")
        .bind(batch.project_id)
        .fetch_one(&mut *conn)
        .await?;
    if !can_work_on_batch(&mut *conn, worker, batch, project_active).await? {
        return Ok(Vec::new());
    }

    let rows: Vec<(DbId,)> = if batch.assignments_per_task == 1 {
        sqlx::query_as(
            "SELECT t.id FROM tasks t \
             WHERE t.batch_id = $1 AND t.completed = FALSE \
               AND NOT EXISTS (SELECT 1 FROM assignments a WHERE a.task_id = t.id) \
             ORDER BY t.id",
        )
        .bind(batch.id)
        .fetch_all(&mut *conn)
        .await?
    } else if let Some(user_id) = worker.user_id() {
        sqlx::query_as(
            "SELECT t.id FROM tasks t \
             WHERE t.batch_id = $1 AND t.completed = FALSE \
               AND NOT EXISTS ( \
                   SELECT 1 FROM assignments a \
                   WHERE a.task_id = t.id AND a.assigned_to = $2 \
               ) \
               AND (SELECT COUNT(*) FROM assignments a WHERE a.task_id = t.id) < $3 \
             ORDER BY t.id",
        )
        .bind(batch.id)
        .bind(user_id)
        .bind(i64::from(batch.assignments_per_task))
        .fetch_all(&mut *conn)
        .await?
    } else {
        // Multi-assignment batches require login, so the gate normally
        // rejects anonymous workers before this point; if such a batch
        // exists anyway, anonymous claims are only capped by the count.
        sqlx::query_as(
            "SELECT t.id FROM tasks t \
             WHERE t.batch_id = $1 AND t.completed = FALSE \
               AND (SELECT COUNT(*) FROM assignments a WHERE a.task_id = t.id) < $2 \
             ORDER BY t.id",
        )
        .bind(batch.id)
        .bind(i64::from(batch.assignments_per_task))
        .fetch_all(&mut *conn)
        .await?
    };

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Number of tasks in `batch` available to `worker`.
pub async fn available_task_count(
    conn: &mut PgConnection,
    batch: &Batch,
    worker: Worker,
) -> Result<i64, sqlx::Error> {
    Ok(available_task_ids(conn, batch, worker).await?.len() as i64)
}

/// Claim the next available task in a batch, skip-aware.
///
/// Prefers the first available task the worker has not skipped; when
/// only skipped tasks remain, falls back to the first of those, reports
/// it via [`Accepted::only_skipped_remain`], and clears the batch's skip
/// list so skipping works again on the next round. Returns `Ok(None)`
/// when nothing is available, which is a signal rather than an error.
pub async fn accept_next(
    pool: &PgPool,
    batch_id: DbId,
    worker: Worker,
    skip: &mut SkipState,
) -> DbResult<Option<Accepted>> {
    let mut tx = pool.begin().await?;

    let batch = BatchRepo::find_by_id(&mut *tx, batch_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Batch",
            id: batch_id,
        })?;

    lock_unfinished_tasks(&mut tx, batch_id).await?;

    let available = available_task_ids(&mut tx, &batch, worker).await?;
    let Some((task_id, only_skipped_remain)) = skip_aware_choice(&available, batch_id, skip)
    else {
        return Ok(None);
    };

    let assignment =
        insert_assignment(&mut tx, task_id, worker, batch.allotted_assignment_time).await?;
    tx.commit().await?;

    log_accept(worker, task_id);
    Ok(Some(Accepted {
        assignment,
        only_skipped_remain,
    }))
}

/// Preview the next task a claim would hand out, without claiming it.
///
/// Applies the same skip-awareness as [`accept_next`], including the
/// skip-list reset, but takes no locks and writes nothing: the task may
/// be claimed by someone else before this worker accepts, which the
/// explicit-accept re-check catches.
pub async fn preview_next(
    pool: &PgPool,
    batch_id: DbId,
    worker: Worker,
    skip: &mut SkipState,
) -> DbResult<Option<(Task, bool)>> {
    let mut conn = pool.acquire().await?;

    let batch = BatchRepo::find_by_id(&mut *conn, batch_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Batch",
            id: batch_id,
        })?;

    let available = available_task_ids(&mut conn, &batch, worker).await?;
    let Some((task_id, only_skipped_remain)) = skip_aware_choice(&available, batch_id, skip)
    else {
        return Ok(None);
    };

    let task = TaskRepo::find_by_id(&mut *conn, task_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Task",
            id: task_id,
        })?;
    Ok(Some((task, only_skipped_remain)))
}

/// Claim one specific task, typically from its preview page.
///
/// Re-validates availability inside the lock: the task may have been
/// claimed since the worker looked at it.
pub async fn accept_task(
    pool: &PgPool,
    batch_id: DbId,
    task_id: DbId,
    worker: Worker,
) -> DbResult<Assignment> {
    let mut tx = pool.begin().await?;

    let batch = BatchRepo::find_by_id(&mut *tx, batch_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Batch",
            id: batch_id,
        })?;
    TaskRepo::find_by_id(&mut *tx, task_id)
        .await?
        .filter(|t| t.batch_id == batch_id)
        .ok_or(CoreError::NotFound {
            entity: "Task",
            id: task_id,
        })?;

    lock_unfinished_tasks(&mut tx, batch_id).await?;

    let available = available_task_ids(&mut tx, &batch, worker).await?;
    if !available.contains(&task_id) {
        return Err(CoreError::Conflict(format!(
            "The Task with ID {task_id} is no longer available"
        ))
        .into());
    }

    let assignment =
        insert_assignment(&mut tx, task_id, worker, batch.allotted_assignment_time).await?;
    tx.commit().await?;

    log_accept(worker, task_id);
    Ok(assignment)
}

/// Submit answers for an assignment, completing it.
///
/// Strips the `csrfmiddlewaretoken` artifact, rejects submissions with
/// no remaining answers, and, in the same transaction under the task's
/// row lock, marks the task completed once completed assignments reach
/// the batch's redundancy factor. The check is `count >= redundancy`,
/// not `==`, so two racing final submissions resolve harmlessly: both
/// may attempt the idempotent task update, and at least one sees the
/// full count.
pub async fn submit(
    pool: &PgPool,
    task_id: DbId,
    assignment_id: DbId,
    worker: Worker,
    mut answers: serde_json::Map<String, serde_json::Value>,
) -> DbResult<Assignment> {
    answers.remove("csrfmiddlewaretoken");
    if answers.is_empty() {
        return Err(CoreError::Validation(
            "Your submission did not contain any answers".into(),
        )
        .into());
    }

    let mut tx = pool.begin().await?;

    let task = lock_task(&mut tx, task_id).await?.ok_or(CoreError::NotFound {
        entity: "Task",
        id: task_id,
    })?;
    let assignment = AssignmentRepo::find_by_id(&mut *tx, assignment_id)
        .await?
        .filter(|a| a.task_id == task_id)
        .ok_or(CoreError::NotFound {
            entity: "Task Assignment",
            id: assignment_id,
        })?;

    check_owner(&assignment, worker)?;
    if assignment.completed {
        return Err(CoreError::Conflict(format!(
            "The Task Assignment with ID {assignment_id} has already been completed"
        ))
        .into());
    }

    let query = format!(
        "UPDATE assignments \
         SET answers = $2, completed = TRUE, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {}",
        crate::repositories::ASSIGNMENT_COLUMNS
    );
    let assignment = sqlx::query_as::<_, Assignment>(&query)
        .bind(assignment_id)
        .bind(serde_json::Value::Object(answers))
        .fetch_one(&mut *tx)
        .await?;

    let (redundancy,): (i32,) =
        sqlx::query_as("SELECT assignments_per_task FROM batches WHERE id = $1")
            .bind(task.batch_id)
            .fetch_one(&mut *tx)
            .await?;
    let completed_count = AssignmentRepo::completed_count_for_task(&mut *tx, task_id).await?;
    if completed_count >= i64::from(redundancy) {
        sqlx::query("UPDATE tasks SET completed = TRUE WHERE id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
    }
    BatchRepo::sync_completed(&mut *tx, task.batch_id).await?;

    tx.commit().await?;

    match worker {
        Worker::Authenticated(user_id) => {
            tracing::info!(user_id, task_id, assignment_id, "User submitted task")
        }
        Worker::Anonymous => {
            tracing::info!(task_id, assignment_id, "Anonymous user submitted task")
        }
    }
    Ok(assignment)
}

/// Return an unfinished assignment, freeing its task for reassignment.
///
/// Completed assignments cannot be returned. Only the owner may return
/// an assignment; an anonymous assignment may only be returned by an
/// anonymous caller, and only when the project does not require login.
pub async fn return_assignment(
    pool: &PgPool,
    task_id: DbId,
    assignment_id: DbId,
    worker: Worker,
) -> DbResult<()> {
    let mut tx = pool.begin().await?;

    let task = lock_task(&mut tx, task_id).await?.ok_or(CoreError::NotFound {
        entity: "Task",
        id: task_id,
    })?;
    let assignment = AssignmentRepo::find_by_id(&mut *tx, assignment_id)
        .await?
        .filter(|a| a.task_id == task_id)
        .ok_or(CoreError::NotFound {
            entity: "Task Assignment",
            id: assignment_id,
        })?;

    if assignment.completed {
        return Err(CoreError::Conflict(
            "The Task can't be returned because it has been completed".into(),
        )
        .into());
    }
    match worker {
        Worker::Authenticated(user_id) => {
            if assignment.assigned_to != Some(user_id) {
                return Err(CoreError::Forbidden(
                    "The Task you are trying to return belongs to another user".into(),
                )
                .into());
            }
        }
        Worker::Anonymous => {
            if assignment.assigned_to.is_some() {
                return Err(CoreError::Forbidden(
                    "The Task you are trying to return belongs to another user".into(),
                )
                .into());
            }
            let (login_required,): (bool,) = sqlx::query_as(
                "SELECT p.login_required FROM projects p \
                 JOIN batches b ON b.project_id = p.id \
                 WHERE b.id = $1",
            )
            .bind(task.batch_id)
            .fetch_one(&mut *tx)
            .await?;
            if login_required {
                return Err(CoreError::Forbidden(
                    "You do not have permission to access this Task".into(),
                )
                .into());
            }
        }
    }

    sqlx::query("DELETE FROM assignments WHERE id = $1")
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    match worker {
        Worker::Authenticated(user_id) => {
            tracing::info!(user_id, task_id, "User returned task")
        }
        Worker::Anonymous => tracing::info!(task_id, "Anonymous user returned task"),
    }
    Ok(())
}

/// Delete every incomplete assignment whose expiry has passed.
///
/// Maintenance entry point for a periodic external job; never touches
/// completed assignments regardless of `expires_at`. Returns the number
/// deleted for operator logging.
pub async fn expire_abandoned(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM assignments WHERE completed = FALSE AND expires_at < NOW()")
            .execute(pool)
            .await?;
    let deleted = result.rows_affected();
    if deleted > 0 {
        tracing::info!(deleted, "Expired abandoned assignments");
    }
    Ok(deleted)
}

/// Pick the first available task the worker has not skipped.
///
/// When every available task has been skipped, falls back to the first
/// available one, clears the batch's skip list, and reports the
/// condition (second tuple member true).
fn skip_aware_choice(
    available: &[DbId],
    batch_id: DbId,
    skip: &mut SkipState,
) -> Option<(DbId, bool)> {
    let first = *available.first()?;
    let skipped = skip.skipped(batch_id);
    if skipped.is_empty() {
        return Some((first, false));
    }
    if let Some(&id) = available.iter().find(|id| !skipped.contains(id)) {
        return Some((id, false));
    }
    skip.clear_batch(batch_id);
    Some((first, true))
}

/// Take `FOR UPDATE` locks on every unfinished task row in the batch;
/// the candidate set any concurrent claim would consider.
async fn lock_unfinished_tasks(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    batch_id: DbId,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT id FROM tasks WHERE batch_id = $1 AND completed = FALSE FOR UPDATE")
        .bind(batch_id)
        .fetch_all(&mut **tx)
        .await?;
    Ok(())
}

/// Lock and fetch one task row.
async fn lock_task(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: DbId,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "SELECT id, batch_id, completed, input_fields FROM tasks WHERE id = $1 FOR UPDATE",
    )
    .bind(task_id)
    .fetch_optional(&mut **tx)
    .await
}

async fn insert_assignment(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: DbId,
    worker: Worker,
    allotted_hours: i32,
) -> Result<Assignment, sqlx::Error> {
    let query = format!(
        "INSERT INTO assignments (task_id, assigned_to, expires_at) \
         VALUES ($1, $2, NOW() + make_interval(hours => $3)) \
         RETURNING {}",
        crate::repositories::ASSIGNMENT_COLUMNS
    );
    sqlx::query_as::<_, Assignment>(&query)
        .bind(task_id)
        .bind(worker.user_id())
        .bind(allotted_hours)
        .fetch_one(&mut **tx)
        .await
}

fn check_owner(assignment: &Assignment, worker: Worker) -> Result<(), CoreError> {
    let owned = match worker {
        Worker::Authenticated(user_id) => assignment.assigned_to == Some(user_id),
        Worker::Anonymous => assignment.assigned_to.is_none(),
    };
    if owned {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "You do not have permission to work on the Task Assignment with ID {}",
            assignment.id
        )))
    }
}

fn log_accept(worker: Worker, task_id: DbId) {
    match worker {
        Worker::Authenticated(user_id) => tracing::info!(user_id, task_id, "User accepted task"),
        Worker::Anonymous => tracing::info!(task_id, "Anonymous user accepted task"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(batch_id: DbId, skipped: &[DbId]) -> SkipState {
        let mut state = SkipState::default();
        for &id in skipped {
            state.skip(batch_id, id);
        }
        state
    }

    #[test]
    fn no_available_tasks_yields_none() {
        let mut skip = SkipState::default();
        assert_eq!(skip_aware_choice(&[], 1, &mut skip), None);
    }

    #[test]
    fn no_skips_takes_first_available() {
        let mut skip = SkipState::default();
        assert_eq!(skip_aware_choice(&[5, 6, 7], 1, &mut skip), Some((5, false)));
    }

    #[test]
    fn skipped_tasks_are_passed_over() {
        let mut skip = state_with(1, &[5, 6]);
        assert_eq!(skip_aware_choice(&[5, 6, 7], 1, &mut skip), Some((7, false)));
        // Skip list untouched while unskipped tasks remain.
        assert_eq!(skip.skipped(1), [5, 6]);
    }

    #[test]
    fn all_skipped_falls_back_and_clears() {
        let mut skip = state_with(1, &[5, 6, 7]);
        assert_eq!(skip_aware_choice(&[5, 6, 7], 1, &mut skip), Some((5, true)));
        assert!(skip.skipped(1).is_empty());
    }

    #[test]
    fn skip_lists_are_per_batch() {
        let mut skip = state_with(2, &[5]);
        assert_eq!(skip_aware_choice(&[5], 1, &mut skip), Some((5, false)));
    }
}
