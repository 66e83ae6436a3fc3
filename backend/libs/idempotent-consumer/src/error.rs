//! Error types for idempotent sinks

use thiserror::Error;

/// Result type for idempotent writes
pub type IdempotencyResult<T> = Result<T, IdempotencyError>;

/// Storage failures surfaced by an idempotent sink.
///
/// A duplicate insert is never reported here; it is the
/// [`PersistOutcome::Duplicate`](crate::PersistOutcome::Duplicate) outcome.
#[derive(Error, Debug)]
pub enum IdempotencyError {
    /// Database operation failed (connection, query execution, etc.)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Storage backend unavailable or rejected the write
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl IdempotencyError {
    /// Check if error is a unique-key violation (row already exists)
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            IdempotencyError::Database(sqlx_err) => {
                // PostgreSQL unique violation error code: 23505
                if let Some(db_err) = sqlx_err.as_database_error() {
                    db_err.code().as_deref() == Some("23505")
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Check if error is transient (likely to succeed on retry)
    ///
    /// Informational only: callers retry every storage failure against the
    /// same budget.
    pub fn is_transient(&self) -> bool {
        match self {
            IdempotencyError::Database(sqlx_err) => matches!(
                sqlx_err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            IdempotencyError::Unavailable(_) => true,
        }
    }
}
