//! Read-side queries: the worker dashboard, export row fetches, and
//! aggregate statistics.
//!
//! Every query returns a materialized result set with a declared
//! ordering; availability and export data must be reproducible, so
//! nothing here hides behind deferred evaluation.

use std::collections::HashMap;

use piecework_core::export::ResultRow;
use piecework_core::stats::WorkTimeStats;
use piecework_core::types::{DbId, Timestamp};
use piecework_core::worker::Worker;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::allocation::available_task_count;
use crate::models::batch::{Batch, BatchListing};
use crate::models::string_map;

/// Accessible batches with work remaining for `worker`, newest first.
///
/// A batch appears only when the worker passes the permission gate and
/// at least one task is available to them.
pub async fn list_available_batches(
    pool: &PgPool,
    worker: Worker,
) -> Result<Vec<BatchListing>, sqlx::Error> {
    let mut conn = pool.acquire().await?;

    let batches: Vec<Batch> = sqlx::query_as(
        "SELECT b.id, b.project_id, b.name, b.filename, b.assignments_per_task, \
                b.allotted_assignment_time, b.active, b.published, b.completed, \
                b.login_required, b.custom_permissions, b.created_by, \
                b.created_at, b.updated_at \
         FROM batches b \
         JOIN projects p ON p.id = b.project_id \
         WHERE b.active = TRUE AND b.published = TRUE AND b.completed = FALSE \
           AND p.active = TRUE \
         ORDER BY b.created_at DESC, b.id DESC",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut listings = Vec::new();
    for batch in batches {
        // The availability query embeds the permission gate, so a batch
        // the worker cannot work on reports zero and is dropped here.
        let available = available_task_count(&mut conn, &batch, worker).await?;
        if available > 0 {
            let (project_name,): (String,) =
                sqlx::query_as("SELECT name FROM projects WHERE id = $1")
                    .bind(batch.project_id)
                    .fetch_one(&mut *conn)
                    .await?;
            listings.push(BatchListing {
                batch_id: batch.id,
                batch_name: batch.name,
                project_name,
                published_at: batch.created_at,
                assignments_available: available,
            });
        }
    }
    Ok(listings)
}

#[derive(Debug, FromRow)]
struct ExportRow {
    task_id: DbId,
    project_id: DbId,
    project_name: String,
    batch_created_at: Timestamp,
    assignments_per_task: i32,
    allotted_hours: i32,
    assignment_id: DbId,
    worker_id: Option<DbId>,
    worker_username: Option<String>,
    accepted_at: Timestamp,
    submitted_at: Timestamp,
    input_fields: serde_json::Value,
    answers: serde_json::Value,
}

impl From<ExportRow> for ResultRow {
    fn from(row: ExportRow) -> Self {
        ResultRow {
            task_id: row.task_id,
            project_id: row.project_id,
            project_name: row.project_name,
            batch_created_at: row.batch_created_at,
            assignments_per_task: row.assignments_per_task,
            allotted_hours: row.allotted_hours,
            assignment_id: row.assignment_id,
            worker_id: row.worker_id,
            worker_username: row.worker_username,
            accepted_at: row.accepted_at,
            submitted_at: row.submitted_at,
            input_fields: string_map(&row.input_fields),
            answers: string_map(&row.answers),
        }
    }
}

const EXPORT_SELECT: &str = "\
    SELECT t.id AS task_id, p.id AS project_id, p.name AS project_name, \
           b.created_at AS batch_created_at, b.assignments_per_task, \
           b.allotted_assignment_time AS allotted_hours, \
           a.id AS assignment_id, a.assigned_to AS worker_id, \
           u.username AS worker_username, \
           a.created_at AS accepted_at, a.updated_at AS submitted_at, \
           t.input_fields, a.answers \
    FROM assignments a \
    JOIN tasks t ON t.id = a.task_id \
    JOIN batches b ON b.id = t.batch_id \
    JOIN projects p ON p.id = b.project_id \
    LEFT JOIN users u ON u.id = a.assigned_to \
    WHERE a.completed = TRUE";

/// Completed assignments of one batch, joined for export, in assignment
/// creation order.
pub async fn result_rows_for_batch(
    pool: &PgPool,
    batch_id: DbId,
) -> Result<Vec<ResultRow>, sqlx::Error> {
    let query = format!("{EXPORT_SELECT} AND b.id = $1 ORDER BY a.id");
    let rows: Vec<ExportRow> = sqlx::query_as(&query).bind(batch_id).fetch_all(pool).await?;
    Ok(rows.into_iter().map(ResultRow::from).collect())
}

/// Completed assignments across every batch of a project.
pub async fn result_rows_for_project(
    pool: &PgPool,
    project_id: DbId,
) -> Result<Vec<ResultRow>, sqlx::Error> {
    let query = format!("{EXPORT_SELECT} AND p.id = $1 ORDER BY a.id");
    let rows: Vec<ExportRow> = sqlx::query_as(&query)
        .bind(project_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(ResultRow::from).collect())
}

/// Input field maps for every task of a batch, in creation order, for
/// the input-only export.
pub async fn task_input_maps(
    pool: &PgPool,
    batch_id: DbId,
) -> Result<Vec<HashMap<String, String>>, sqlx::Error> {
    let rows: Vec<(serde_json::Value,)> =
        sqlx::query_as("SELECT input_fields FROM tasks WHERE batch_id = $1 ORDER BY id")
            .bind(batch_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.iter().map(|(v,)| string_map(v)).collect())
}

/// Aggregate statistics for a batch or project.
#[derive(Debug, Serialize)]
pub struct AggregateStats {
    pub total_tasks: i64,
    pub finished_tasks: i64,
    pub finished_assignments: i64,
    pub distinct_workers: i64,
    pub work_time: WorkTimeStats,
}

pub async fn batch_stats(pool: &PgPool, batch_id: DbId) -> Result<AggregateStats, sqlx::Error> {
    let (total_tasks, finished_tasks): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE completed) \
         FROM tasks WHERE batch_id = $1",
    )
    .bind(batch_id)
    .fetch_one(pool)
    .await?;
    let (finished_assignments, distinct_workers): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(DISTINCT a.assigned_to) \
         FROM assignments a JOIN tasks t ON t.id = a.task_id \
         WHERE a.completed = TRUE AND t.batch_id = $1",
    )
    .bind(batch_id)
    .fetch_one(pool)
    .await?;
    let work_times = work_times(pool, "t.batch_id", batch_id).await?;
    Ok(AggregateStats {
        total_tasks,
        finished_tasks,
        finished_assignments,
        distinct_workers,
        work_time: WorkTimeStats::from_work_times(&work_times),
    })
}

pub async fn project_stats(
    pool: &PgPool,
    project_id: DbId,
) -> Result<AggregateStats, sqlx::Error> {
    let (total_tasks, finished_tasks): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE t.completed) \
         FROM tasks t JOIN batches b ON b.id = t.batch_id \
         WHERE b.project_id = $1",
    )
    .bind(project_id)
    .fetch_one(pool)
    .await?;
    let (finished_assignments, distinct_workers): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(DISTINCT a.assigned_to) \
         FROM assignments a \
         JOIN tasks t ON t.id = a.task_id \
         JOIN batches b ON b.id = t.batch_id \
         WHERE a.completed = TRUE AND b.project_id = $1",
    )
    .bind(project_id)
    .fetch_one(pool)
    .await?;
    let work_times = work_times(pool, "b.project_id", project_id).await?;
    Ok(AggregateStats {
        total_tasks,
        finished_tasks,
        finished_assignments,
        distinct_workers,
        work_time: WorkTimeStats::from_work_times(&work_times),
    })
}

async fn work_times(
    pool: &PgPool,
    scope_column: &str,
    scope_id: DbId,
) -> Result<Vec<i64>, sqlx::Error> {
    let query = format!(
        "SELECT FLOOR(EXTRACT(EPOCH FROM (a.updated_at - a.created_at)))::BIGINT \
         FROM assignments a \
         JOIN tasks t ON t.id = a.task_id \
         JOIN batches b ON b.id = t.batch_id \
         WHERE a.completed = TRUE AND {scope_column} = $1 \
         ORDER BY a.id"
    );
    let rows: Vec<(i64,)> = sqlx::query_as(&query).bind(scope_id).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(s,)| s).collect())
}

/// One batch's worth of a worker's completed output.
#[derive(Debug, FromRow, Serialize)]
pub struct WorkerBatchStat {
    pub project_name: String,
    pub batch_name: String,
    pub completed: i64,
    pub elapsed_seconds: i64,
}

/// A worker's completed assignments, grouped per batch, with an
/// optional submission-date range (inclusive).
pub async fn worker_stats(
    pool: &PgPool,
    user_id: DbId,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
) -> Result<Vec<WorkerBatchStat>, sqlx::Error> {
    sqlx::query_as(
        "SELECT p.name AS project_name, b.name AS batch_name, \
                COUNT(*) AS completed, \
                COALESCE(SUM(FLOOR(EXTRACT(EPOCH FROM (a.updated_at - a.created_at)))), 0)::BIGINT \
                    AS elapsed_seconds \
         FROM assignments a \
         JOIN tasks t ON t.id = a.task_id \
         JOIN batches b ON b.id = t.batch_id \
         JOIN projects p ON p.id = b.project_id \
         WHERE a.completed = TRUE AND a.assigned_to = $1 \
           AND ($2::timestamptz IS NULL OR a.updated_at >= $2) \
           AND ($3::timestamptz IS NULL OR a.updated_at <= $3) \
         GROUP BY p.id, p.name, b.id, b.name \
         ORDER BY p.id, b.id",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}
