use std::collections::HashMap;

use piecework_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

use super::string_map;

/// A row from the `tasks` table: one CSV data row bound to a batch.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: DbId,
    pub batch_id: DbId,
    /// Derived: flips to true when completed assignments reach the
    /// batch's redundancy factor. Never unset.
    pub completed: bool,
    /// The CSV row, keyed by the CSV header.
    pub input_fields: serde_json::Value,
}

impl Task {
    pub fn input_map(&self) -> HashMap<String, String> {
        string_map(&self.input_fields)
    }
}
