//! # Idempotent Sink
//!
//! Persistence contract for at-least-once consumers. A sink writes an event
//! keyed by its natural id and reports whether the row was freshly inserted
//! or already present. Uniqueness is enforced by the storage layer, never by
//! an in-process lock, so any number of consumers (or a restarted consumer
//! replaying uncommitted offsets) can race on the same id safely.
//!
//! ## Architecture
//!
//! ```text
//! Kafka → Consumer → IdempotentSink::persist → PostgreSQL
//!                          ↓
//!              INSERT ... ON CONFLICT DO NOTHING
//!                          ↓
//!            rows_affected: 1 = Inserted, 0 = Duplicate
//! ```
//!
//! ## Schema requirement
//!
//! ```sql
//! CREATE TABLE analytics_loans (
//!     loan_id      INTEGER PRIMARY KEY,
//!     processed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! ## Usage Example
//!
//! ```ignore
//! use idempotent_consumer::{IdempotencyResult, IdempotentSink, PersistOutcome};
//!
//! #[async_trait::async_trait]
//! impl IdempotentSink for MyRepository {
//!     type Event = MyEvent;
//!
//!     async fn persist(&self, event: &MyEvent) -> IdempotencyResult<PersistOutcome> {
//!         let result = sqlx::query(
//!             "INSERT INTO my_table (id) VALUES ($1) ON CONFLICT (id) DO NOTHING",
//!         )
//!         .bind(event.id)
//!         .execute(&self.pool)
//!         .await;
//!
//!         PersistOutcome::from_insert_result(result)
//!     }
//! }
//! ```
//!
//! ## Retries
//!
//! Sinks never retry internally. A failed `persist` returns
//! [`IdempotencyError`] and the caller owns the retry budget.

use async_trait::async_trait;
use sqlx::postgres::PgQueryResult;
use tracing::debug;

mod error;

pub use error::{IdempotencyError, IdempotencyResult};

/// Terminal outcome of a successful idempotent write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Row did not exist and was written by this call
    Inserted,

    /// Row already existed (earlier attempt, crashed predecessor, or racing consumer)
    Duplicate,
}

impl PersistOutcome {
    /// Map the row count of an `INSERT ... ON CONFLICT DO NOTHING`.
    pub fn from_rows_affected(rows_affected: u64) -> Self {
        if rows_affected > 0 {
            PersistOutcome::Inserted
        } else {
            PersistOutcome::Duplicate
        }
    }

    /// Map the raw result of an idempotent insert.
    ///
    /// A unique violation that slips past `ON CONFLICT` (e.g. a conflict on a
    /// secondary unique index) is still a duplicate, not a failure.
    pub fn from_insert_result(
        result: Result<PgQueryResult, sqlx::Error>,
    ) -> IdempotencyResult<Self> {
        match result {
            Ok(done) => Ok(Self::from_rows_affected(done.rows_affected())),
            Err(e) => {
                let err = IdempotencyError::from(e);
                if err.is_duplicate_key() {
                    debug!("Unique violation on insert treated as duplicate");
                    Ok(PersistOutcome::Duplicate)
                } else {
                    Err(err)
                }
            }
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, PersistOutcome::Duplicate)
    }
}

/// Write-once persistence keyed by an event's natural id.
///
/// Implementations must be safe to call concurrently and must not retry
/// internally.
#[async_trait]
pub trait IdempotentSink: Send + Sync {
    type Event: Send + Sync;

    async fn persist(&self, event: &Self::Event) -> IdempotencyResult<PersistOutcome>;
}

#[async_trait]
impl<T> IdempotentSink for std::sync::Arc<T>
where
    T: IdempotentSink + ?Sized,
{
    type Event = T::Event;

    async fn persist(&self, event: &Self::Event) -> IdempotencyResult<PersistOutcome> {
        (**self).persist(event).await
    }
}
