use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use crate::error::Result;
use crate::models::{CreateLoanRequest, LoanResponse};

/// Loan persistence used by the HTTP handlers
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Insert a new loan in `pending` status and return the stored row.
    async fn create(&self, request: &CreateLoanRequest) -> Result<LoanResponse>;

    /// Connectivity check for `/health`.
    async fn ping(&self) -> Result<()>;
}

pub struct PgLoanRepository {
    pool: PgPool,
}

impl PgLoanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanStore for PgLoanRepository {
    async fn create(&self, request: &CreateLoanRequest) -> Result<LoanResponse> {
        let loan = sqlx::query_as::<_, LoanResponse>(
            "INSERT INTO loans (user_id, amount, status) \
             VALUES ($1, $2, 'pending') \
             RETURNING id, user_id, amount, status, created_at",
        )
        .bind(request.user_id)
        .bind(request.amount)
        .fetch_one(&self.pool)
        .await?;

        info!(
            loan_id = loan.id,
            user_id = loan.user_id,
            amount = %loan.amount,
            "Loan created"
        );
        Ok(loan)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
