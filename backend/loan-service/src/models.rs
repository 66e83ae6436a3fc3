use chrono::{DateTime, Utc};
use event_schema::LoanCreatedEvent;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/loans`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateLoanRequest {
    pub user_id: i32,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
}

/// Stored loan as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
pub struct LoanResponse {
    pub id: i32,
    pub user_id: i32,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<&LoanResponse> for LoanCreatedEvent {
    fn from(loan: &LoanResponse) -> Self {
        LoanCreatedEvent {
            loan_id: loan.id,
            user_id: loan.user_id,
            amount: loan.amount,
            created_at: loan.created_at,
        }
    }
}
