pub mod batch;
pub mod health;
pub mod maintenance;
pub mod project;
pub mod task;
pub mod user;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /projects                                 list, create
/// /projects/{id}                            get, update, delete
/// /projects/{id}/batches                    create from CSV (multipart)
/// /projects/{id}/results                    project-wide results CSV
/// /projects/{id}/stats                      aggregate statistics
///
/// /batches                                  worker dashboard
/// /batches/{id}                             get, delete
/// /batches/{id}/accept                      claim next available task
/// /batches/{id}/tasks/next                  preview next task
/// /batches/{id}/tasks/{task_id}/accept      claim a specific task
/// /batches/{id}/tasks/{task_id}/skip        record a skip (session only)
/// /batches/{id}/results                     results CSV
/// /batches/{id}/input                       input-only CSV
/// /batches/{id}/stats                       aggregate statistics
///
/// /tasks/{id}                               task with populated HTML
/// /tasks/{task_id}/assignments/{id}/submit  submit answers
/// /tasks/{task_id}/assignments/{id}/return  return unfinished work
///
/// /users                                    register (admin only)
/// /users/{id}                               get (self or admin)
/// /users/{id}/stats                         per-worker statistics
///
/// /maintenance/expire                       expiry sweep (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/projects", project::router())
        .nest("/batches", batch::router())
        .nest("/tasks", task::router())
        .nest("/users", user::router())
        .nest("/maintenance", maintenance::router())
}
