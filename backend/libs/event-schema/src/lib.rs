//! Event schemas shared by the loan pipeline services
//!
//! `loan-service` publishes [`LoanCreatedEvent`] to [`topics::LOAN_EVENTS`];
//! `analytics-service` consumes it and forwards poison messages to
//! [`topics::LOAN_EVENTS_DLQ`] untouched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default Kafka topic names
pub mod topics {
    /// Loan lifecycle events, keyed by loan id
    pub const LOAN_EVENTS: &str = "loan_events";
    /// Recovery stream for loan events that exhausted their retry budget
    pub const LOAN_EVENTS_DLQ: &str = "loan_events_dlq";
}

/// Errors raised while encoding or decoding event payloads
#[derive(Debug, Error)]
pub enum EventSchemaError {
    #[error("Empty event payload")]
    EmptyPayload,

    #[error("Malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Emitted once per loan after it is stored by loan-service.
///
/// Wire format is a JSON object with PascalCase keys, `Amount` as a JSON number:
///
/// ```json
/// {"LoanId": 42, "UserId": 1, "Amount": 100.00, "CreatedAt": "2024-01-01T00:00:00Z"}
/// ```
///
/// `Amount` keeps every digit the producer wrote. A `CreatedAt` without an
/// offset is read as UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoanCreatedEvent {
    pub loan_id: i32,
    pub user_id: i32,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
    #[serde(deserialize_with = "utc_timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

mod utc_timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        raw.parse::<NaiveDateTime>()
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(de::Error::custom)
    }
}

impl LoanCreatedEvent {
    /// Partitioning key: the loan id rendered as a decimal string.
    pub fn partition_key(&self) -> String {
        self.loan_id.to_string()
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, EventSchemaError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, EventSchemaError> {
        if payload.is_empty() {
            return Err(EventSchemaError::EmptyPayload);
        }
        Ok(serde_json::from_slice(payload)?)
    }
}
