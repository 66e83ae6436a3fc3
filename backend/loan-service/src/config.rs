use crate::error::{LoanError, Result};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// loan-service configuration, read from the environment.
#[derive(Clone, Deserialize)]
pub struct LoanConfig {
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    pub kafka_brokers: String,
    pub kafka_topic: String,
    /// Delivery timeout for a single publish, broker ack included
    #[serde(default = "default_message_timeout_ms")]
    pub kafka_message_timeout_ms: u64,

    #[serde(default = "default_port")]
    pub loan_service_port: u16,
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_message_timeout_ms() -> u64 {
    5000
}

fn default_port() -> u16 {
    5001
}

impl fmt::Debug for LoanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoanConfig")
            .field("database_url", &"[REDACTED]")
            .field("db_max_connections", &self.db_max_connections)
            .field("kafka_brokers", &self.kafka_brokers)
            .field("kafka_topic", &self.kafka_topic)
            .field("kafka_message_timeout_ms", &self.kafka_message_timeout_ms)
            .field("loan_service_port", &self.loan_service_port)
            .finish()
    }
}

impl LoanConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_iter<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("DATABASE_URL", &self.database_url),
            ("KAFKA_BROKERS", &self.kafka_brokers),
            ("KAFKA_TOPIC", &self.kafka_topic),
        ] {
            if value.trim().is_empty() {
                return Err(LoanError::Config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_message_timeout_ms)
    }
}
