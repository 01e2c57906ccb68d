//! Route definitions for the `/projects` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{batch, export, project, stats};
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// GET    /              -> list
/// POST   /              -> create
/// GET    /{id}          -> get_by_id
/// PUT    /{id}          -> update
/// DELETE /{id}          -> delete
/// POST   /{id}/batches  -> create batch from CSV upload
/// GET    /{id}/results  -> project-wide results CSV
/// GET    /{id}/stats    -> aggregate statistics
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(project::list).post(project::create))
        .route(
            "/{id}",
            get(project::get_by_id)
                .put(project::update)
                .delete(project::delete),
        )
        .route("/{id}/batches", post(batch::create))
        .route("/{id}/results", get(export::project_results))
        .route("/{id}/stats", get(stats::project_stats))
}
