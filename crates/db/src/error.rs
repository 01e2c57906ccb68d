use piecework_core::error::CoreError;

/// Error type for engine operations that mix SQL failures with domain
/// rules (ownership, availability, validation).
///
/// Plain repositories return `sqlx::Error` directly; this type exists for
/// the allocation engine and batch ingest, where a single operation can
/// fail either way and the caller must tell the two apart.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;
