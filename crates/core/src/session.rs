//! Caller-owned per-session worker state.
//!
//! Skipped task ids and the auto-accept preference belong to the
//! worker's session, which is stored by an external collaborator. The
//! allocation engine only reads the skip list and clears it once every
//! remaining available task has been skipped; it never persists it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Per-session skip list and preferences, keyed by batch id.
///
/// Serialized as an opaque JSON blob that the caller carries between
/// requests. Skipped ids keep insertion order so "first non-skipped
/// available task" stays deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkipState {
    #[serde(default)]
    pub skipped_tasks_in_batch: HashMap<DbId, Vec<DbId>>,
    /// Whether submitting an assignment should immediately accept the
    /// next task in the same batch.
    #[serde(default)]
    pub auto_accept: bool,
}

impl SkipState {
    /// Record a skipped task. Duplicate skips are ignored.
    pub fn skip(&mut self, batch_id: DbId, task_id: DbId) {
        let skipped = self.skipped_tasks_in_batch.entry(batch_id).or_default();
        if !skipped.contains(&task_id) {
            skipped.push(task_id);
        }
    }

    /// The task ids skipped in `batch_id`, empty if none.
    pub fn skipped(&self, batch_id: DbId) -> &[DbId] {
        self.skipped_tasks_in_batch
            .get(&batch_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Clear the skip list for one batch. Called by the engine when only
    /// previously skipped tasks remain, so skip is usable again on the
    /// next round.
    pub fn clear_batch(&mut self, batch_id: DbId) {
        if let Some(skipped) = self.skipped_tasks_in_batch.get_mut(&batch_id) {
            skipped.clear();
        }
    }
}
