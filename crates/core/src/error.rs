use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// CSV upload validation. Carries one message per problem so a bad
    /// upload reports every offending line at once, not just the first.
    #[error("CSV validation failed: {}", .0.join("; "))]
    CsvValidation(Vec<String>),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias for domain-level results.
pub type CoreResult<T> = Result<T, CoreError>;
