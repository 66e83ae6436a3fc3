use crate::error::{AnalyticsError, Result};
use resilience::RetryPolicy;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// What the consumer does when publishing to the dead-letter topic fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DlqFailurePolicy {
    /// Log the failure and commit anyway; the partition never blocks
    #[default]
    Advance,
    /// Keep re-publishing with backoff until delivered or shutdown
    #[serde(rename = "retry")]
    RetryUntilDelivered,
}

/// analytics-service configuration, read from the environment.
///
/// Kafka settings and the retry budget are required; startup fails without them.
#[derive(Clone, Deserialize)]
pub struct AnalyticsConfig {
    pub kafka_brokers: String,
    /// Source topic
    pub kafka_topic: String,
    pub kafka_dlq_topic: String,
    pub kafka_group_id: String,
    /// Total attempts per event, including the first
    pub kafka_max_retries: u32,
    pub kafka_retry_delay_ms: u64,
    #[serde(default = "default_poll_timeout_ms")]
    pub kafka_poll_timeout_ms: u64,
    #[serde(default = "default_dlq_delivery_timeout_ms")]
    pub kafka_dlq_delivery_timeout_ms: u64,
    #[serde(default)]
    pub dlq_failure_policy: DlqFailurePolicy,

    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_port")]
    pub analytics_service_port: u16,
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_dlq_delivery_timeout_ms() -> u64 {
    5000
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_port() -> u16 {
    5002
}

impl fmt::Debug for AnalyticsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsConfig")
            .field("kafka_brokers", &self.kafka_brokers)
            .field("kafka_topic", &self.kafka_topic)
            .field("kafka_dlq_topic", &self.kafka_dlq_topic)
            .field("kafka_group_id", &self.kafka_group_id)
            .field("kafka_max_retries", &self.kafka_max_retries)
            .field("kafka_retry_delay_ms", &self.kafka_retry_delay_ms)
            .field("kafka_poll_timeout_ms", &self.kafka_poll_timeout_ms)
            .field("kafka_dlq_delivery_timeout_ms", &self.kafka_dlq_delivery_timeout_ms)
            .field("dlq_failure_policy", &self.dlq_failure_policy)
            .field("database_url", &"[REDACTED]")
            .field("db_max_connections", &self.db_max_connections)
            .field("analytics_service_port", &self.analytics_service_port)
            .finish()
    }
}

impl AnalyticsConfig {
    /// Load `.env` (if present) and read the process environment.
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
        if self.kafka_max_retries == 0 {
            return Err(AnalyticsError::Config(
                "KAFKA_MAX_RETRIES must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("KAFKA_BROKERS", &self.kafka_brokers),
            ("KAFKA_TOPIC", &self.kafka_topic),
            ("KAFKA_DLQ_TOPIC", &self.kafka_dlq_topic),
            ("KAFKA_GROUP_ID", &self.kafka_group_id),
        ] {
            if value.trim().is_empty() {
                return Err(AnalyticsError::Config(format!("{} must not be empty", name)));
            }
        }
        if self.kafka_topic == self.kafka_dlq_topic {
            return Err(AnalyticsError::Config(
                "KAFKA_DLQ_TOPIC must differ from KAFKA_TOPIC".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.kafka_max_retries,
            Duration::from_millis(self.kafka_retry_delay_ms),
        )
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_poll_timeout_ms)
    }

    pub fn dlq_delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_dlq_delivery_timeout_ms)
    }
}
