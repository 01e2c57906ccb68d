//! Route definitions for maintenance operations.

use axum::routing::post;
use axum::Router;

use crate::handlers::maintenance;
use crate::state::AppState;

/// Routes mounted at `/maintenance`.
///
/// ```text
/// POST /expire -> expiry sweep (admin only)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/expire", post(maintenance::expire))
}
