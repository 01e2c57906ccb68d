use piecework_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `batches` table: one CSV publication of tasks against
/// a project's template.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Batch {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    /// Source CSV filename, kept for result-file naming.
    pub filename: String,
    /// Redundancy factor, immutable after creation.
    pub assignments_per_task: i32,
    /// Hours before an unfinished assignment counts as abandoned.
    pub allotted_assignment_time: i32,
    pub active: bool,
    pub published: bool,
    /// Derived: true iff the batch has no unfinished task.
    pub completed: bool,
    pub login_required: bool,
    pub custom_permissions: bool,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for `POST /projects/{id}/batches`. The CSV itself arrives as a
/// multipart part next to this metadata; unset fields copy the project's
/// values.
#[derive(Debug, Default, Deserialize)]
pub struct CreateBatch {
    pub name: String,
    #[serde(default)]
    pub filename: String,
    pub assignments_per_task: Option<i32>,
    pub allotted_assignment_time: Option<i32>,
    pub login_required: Option<bool>,
    pub custom_permissions: Option<bool>,
    /// Publish immediately (default) or hold for review.
    pub published: Option<bool>,
}

/// Dashboard listing entry: an accessible batch with work remaining.
#[derive(Debug, Clone, Serialize)]
pub struct BatchListing {
    pub batch_id: DbId,
    pub batch_name: String,
    pub project_name: String,
    pub published_at: Timestamp,
    pub assignments_available: i64,
}
