/// Error types for loan-service
///
/// Validation problems surface to clients verbatim; every other failure is
/// logged and reported as a generic 500.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use event_schema::EventSchemaError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoanError>;

#[derive(Debug, Error)]
pub enum LoanError {
    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Event encoding error: {0}")]
    Encode(#[from] EventSchemaError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl From<envy::Error> for LoanError {
    fn from(err: envy::Error) -> Self {
        LoanError::Config(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ResponseError for LoanError {
    fn status_code(&self) -> StatusCode {
        match self {
            LoanError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            LoanError::Validation(msg) => msg.clone(),
            _ => "Internal server error".to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody { error })
    }
}
