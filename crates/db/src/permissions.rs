//! The permission gate: a boolean predicate over worker × batch/project.
//!
//! The underlying grant storage is deliberately minimal (one user-grant
//! table per scope); callers only ever see the yes/no answer, so a
//! richer external ACL system could replace these tables without
//! touching the allocation engine.

use piecework_core::types::DbId;
use piecework_core::worker::Worker;
use sqlx::PgExecutor;

use crate::models::batch::Batch;
use crate::models::project::Project;

/// Can `worker` work on tasks in this batch?
///
/// False when the batch is inactive or unpublished, its project is
/// inactive, the batch requires login and the worker is anonymous, or
/// custom permissions are on and the worker holds no grant.
pub async fn can_work_on_batch(
    ex: impl PgExecutor<'_>,
    worker: Worker,
    batch: &Batch,
    project_active: bool,
) -> Result<bool, sqlx::Error> {
    if !batch.active || !batch.published || !project_active {
        return Ok(false);
    }
    if batch.login_required && !worker.is_authenticated() {
        return Ok(false);
    }
    if batch.custom_permissions {
        // Anonymous workers never hold grants; a custom-permission batch
        // that somehow allows anonymous access stays closed to them.
        return match worker.user_id() {
            Some(user_id) => {
                has_grant(ex, "batch_permissions", "batch_id", batch.id, user_id).await
            }
            None => Ok(false),
        };
    }
    Ok(true)
}

/// Can `worker` view (preview) tasks in this project?
pub async fn can_view_project(
    ex: impl PgExecutor<'_>,
    worker: Worker,
    project: &Project,
) -> Result<bool, sqlx::Error> {
    if !project.active {
        return Ok(false);
    }
    match worker {
        Worker::Anonymous => Ok(!project.login_required && !project.custom_permissions),
        Worker::Authenticated(user_id) => {
            if project.custom_permissions {
                has_grant(ex, "project_permissions", "project_id", project.id, user_id).await
            } else {
                Ok(true)
            }
        }
    }
}

/// Grant a user access to a custom-permission batch.
pub async fn grant_batch_access(
    ex: impl PgExecutor<'_>,
    batch_id: DbId,
    user_id: DbId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO batch_permissions (batch_id, user_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(batch_id)
    .bind(user_id)
    .execute(ex)
    .await?;
    Ok(())
}

/// Grant a user access to a custom-permission project.
pub async fn grant_project_access(
    ex: impl PgExecutor<'_>,
    project_id: DbId,
    user_id: DbId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO project_permissions (project_id, user_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(project_id)
    .bind(user_id)
    .execute(ex)
    .await?;
    Ok(())
}

async fn has_grant(
    ex: impl PgExecutor<'_>,
    table: &str,
    id_column: &str,
    entity_id: DbId,
    user_id: DbId,
) -> Result<bool, sqlx::Error> {
    let query =
        format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE {id_column} = $1 AND user_id = $2)");
    let (exists,): (bool,) = sqlx::query_as(&query)
        .bind(entity_id)
        .bind(user_id)
        .fetch_one(ex)
        .await?;
    Ok(exists)
}
