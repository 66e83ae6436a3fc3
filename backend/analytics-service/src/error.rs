use event_schema::EventSchemaError;
use idempotent_consumer::IdempotencyError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Decode failure: {0}")]
    Decode(#[from] EventSchemaError),

    #[error("Storage failure: {0}")]
    Storage(#[from] IdempotencyError),

    #[error("Dead-letter route failure: {0}")]
    Route(String),
}

impl From<envy::Error> for AnalyticsError {
    fn from(err: envy::Error) -> Self {
        AnalyticsError::Config(err.to_string())
    }
}
