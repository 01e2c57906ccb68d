//! Worker identity as seen by the allocation engine.

use crate::types::DbId;

/// The identity requesting or holding an assignment.
///
/// Anonymous workers are a single shared identity: they are deduplicated
/// against authenticated workers' assignments but not against each other,
/// which is why batches that allow anonymous access are restricted to one
/// assignment per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Worker {
    Authenticated(DbId),
    Anonymous,
}

impl Worker {
    /// The `assigned_to` column value for this worker.
    pub fn user_id(&self) -> Option<DbId> {
        match self {
            Worker::Authenticated(id) => Some(*id),
            Worker::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Worker::Authenticated(_))
    }
}
