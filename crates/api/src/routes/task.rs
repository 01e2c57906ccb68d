//! Route definitions for the `/tasks` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::task;
use crate::state::AppState;

/// Routes mounted at `/tasks`.
///
/// ```text
/// GET  /{id}                                        -> get_by_id
/// POST /{task_id}/assignments/{assignment_id}/submit -> submit
/// POST /{task_id}/assignments/{assignment_id}/return -> return_assignment
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(task::get_by_id))
        .route(
            "/{task_id}/assignments/{assignment_id}/submit",
            post(task::submit),
        )
        .route(
            "/{task_id}/assignments/{assignment_id}/return",
            post(task::return_assignment),
        )
}
