//! Route definitions for the `/users` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{stats, user};
use crate::state::AppState;

/// Routes mounted at `/users`.
///
/// ```text
/// POST /            -> create (admin only)
/// GET  /{id}        -> get_by_id (self or admin)
/// GET  /{id}/stats  -> worker_stats (self or admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(user::create))
        .route("/{id}", get(user::get_by_id))
        .route("/{id}/stats", get(stats::worker_stats))
}
