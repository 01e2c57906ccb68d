//! Route definitions for the `/batches` resource and the work loop
//! endpoints scoped to a batch.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{batch, export, stats, task};
use crate::state::AppState;

/// Routes mounted at `/batches`.
///
/// ```text
/// GET    /                            -> dashboard
/// GET    /{id}                        -> get_by_id
/// DELETE /{id}                        -> delete
/// POST   /{id}/accept                 -> accept_next
/// GET    /{id}/tasks/next             -> preview_next
/// POST   /{id}/tasks/{task_id}/accept -> accept_specific
/// POST   /{id}/tasks/{task_id}/skip   -> skip
/// GET    /{id}/results                -> results CSV
/// GET    /{id}/input                  -> input-only CSV
/// GET    /{id}/stats                  -> aggregate statistics
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(batch::dashboard))
        .route("/{id}", get(batch::get_by_id).delete(batch::delete))
        .route("/{id}/accept", post(task::accept_next))
        .route("/{id}/tasks/next", get(task::preview_next))
        .route("/{id}/tasks/{task_id}/accept", post(task::accept_specific))
        .route("/{id}/tasks/{task_id}/skip", post(task::skip))
        .route("/{id}/results", get(export::batch_results))
        .route("/{id}/input", get(export::batch_input))
        .route("/{id}/stats", get(stats::batch_stats))
}
