use async_trait::async_trait;
use event_schema::LoanCreatedEvent;
use idempotent_consumer::{IdempotencyResult, IdempotentSink, PersistOutcome};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::Result;
use crate::health::StoragePing;

/// Analytics projection of loan events, one row per loan
#[derive(Clone)]
pub struct AnalyticsRepository {
    pool: PgPool,
}

impl AnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotentSink for AnalyticsRepository {
    type Event = LoanCreatedEvent;

    async fn persist(&self, event: &LoanCreatedEvent) -> IdempotencyResult<PersistOutcome> {
        // The primary key on loan_id turns redelivery into a no-op
        let result = sqlx::query(
            r#"
            INSERT INTO analytics_loans (loan_id, user_id, amount, loan_created_at, processed_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (loan_id) DO NOTHING
            "#,
        )
        .bind(event.loan_id)
        .bind(event.user_id)
        .bind(event.amount)
        .bind(event.created_at)
        .execute(&self.pool)
        .await;

        let outcome = PersistOutcome::from_insert_result(result)?;

        match outcome {
            PersistOutcome::Inserted => {
                info!(loan_id = event.loan_id, "Analytics saved for loan");
            }
            PersistOutcome::Duplicate => {
                warn!(loan_id = event.loan_id, "Duplicate loan event skipped");
            }
        }

        Ok(outcome)
    }
}

#[async_trait]
impl StoragePing for AnalyticsRepository {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
