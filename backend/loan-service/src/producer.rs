use async_trait::async_trait;
use event_schema::LoanCreatedEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::LoanConfig;
use crate::error::{LoanError, Result};

#[async_trait]
pub trait LoanEventPublisher: Send + Sync {
    /// Publish and wait for the broker acknowledgement.
    async fn publish_loan_created(&self, event: &LoanCreatedEvent) -> Result<()>;
}

/// Idempotent Kafka producer for loan events, keyed by loan id so every
/// event for a loan lands on the same partition.
pub struct KafkaLoanEventProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaLoanEventProducer {
    pub fn new(config: &LoanConfig) -> Result<Self> {
        let timeout = config.message_timeout();
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka_brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .create()?;

        info!(
            brokers = %config.kafka_brokers,
            topic = %config.kafka_topic,
            "Loan event producer initialized"
        );

        Ok(Self {
            producer,
            topic: config.kafka_topic.clone(),
            timeout,
        })
    }

    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout)?;
        Ok(())
    }
}

#[async_trait]
impl LoanEventPublisher for KafkaLoanEventProducer {
    async fn publish_loan_created(&self, event: &LoanCreatedEvent) -> Result<()> {
        let key = event.partition_key();
        let payload = event.to_payload()?;
        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        debug!(topic = %self.topic, key = %key, "Publishing loan event");

        match self.producer.send(record, self.timeout).await {
            Ok((partition, offset)) => {
                info!(
                    topic = %self.topic,
                    partition = partition,
                    offset = offset,
                    loan_id = event.loan_id,
                    "Event published to Kafka"
                );
                Ok(())
            }
            Err((err, _)) => Err(LoanError::Kafka(err)),
        }
    }
}
