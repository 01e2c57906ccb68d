use piecework_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `projects` table: a reusable HTML template plus the
/// defaults new batches copy.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub name: String,
    pub filename: String,
    pub html_template: String,
    /// Derived on every template write: JSON array of `${name}` placeholders.
    pub fieldnames: serde_json::Value,
    pub has_submit_button: bool,
    pub assignments_per_task: i32,
    /// Hours before an unfinished assignment counts as abandoned.
    pub allotted_assignment_time: i32,
    pub login_required: bool,
    pub custom_permissions: bool,
    pub active: bool,
    pub created_by: Option<DbId>,
    pub updated_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    /// The derived template field names as a sorted set.
    pub fn fieldname_set(&self) -> std::collections::BTreeSet<String> {
        self.fieldnames
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// DTO for `POST /projects`.
#[derive(Debug, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub html_template: String,
    #[serde(default)]
    pub filename: String,
    pub assignments_per_task: Option<i32>,
    pub allotted_assignment_time: Option<i32>,
    pub login_required: Option<bool>,
    pub custom_permissions: Option<bool>,
    pub active: Option<bool>,
}

/// DTO for `PUT /projects/{id}`. Absent fields are left unchanged; a new
/// template re-derives field names and the submit-button flag.
#[derive(Debug, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub html_template: Option<String>,
    pub assignments_per_task: Option<i32>,
    pub allotted_assignment_time: Option<i32>,
    pub login_required: Option<bool>,
    pub custom_permissions: Option<bool>,
    pub active: Option<bool>,
}
