use std::collections::HashMap;

use piecework_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::string_map;

/// A row from the `assignments` table: one worker's claim on a task.
///
/// State machine: created incomplete, then either completed (terminal,
/// via submit) or deleted (returned voluntarily, or reaped by the expiry
/// sweep). `completed` is never unset.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Assignment {
    pub id: DbId,
    pub task_id: DbId,
    /// None is the shared anonymous worker identity.
    pub assigned_to: Option<DbId>,
    pub completed: bool,
    pub answers: serde_json::Value,
    pub created_at: Timestamp,
    /// Doubles as the submission time once completed.
    pub updated_at: Timestamp,
    /// `created_at` plus the batch's allotted assignment time. Set once
    /// at creation, never recomputed.
    pub expires_at: Option<Timestamp>,
}

impl Assignment {
    pub fn answer_map(&self) -> HashMap<String, String> {
        string_map(&self.answers)
    }
}
