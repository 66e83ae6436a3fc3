//! Dead-letter routing for events that exhausted their retry budget
//!
//! The original payload, key and headers are forwarded untouched so the
//! recovery topic can be replayed through the normal decode path.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tracing::{error, info, warn};

use super::source::MessageHeader;
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};

#[async_trait]
pub trait DeadLetterRouter: Send + Sync {
    /// Publish a verbatim copy of a failed message; `Ok` is the broker ack.
    async fn route(
        &self,
        payload: Option<&[u8]>,
        key: Option<&[u8]>,
        headers: &[MessageHeader],
    ) -> Result<()>;

    /// Drain in-flight publishes before shutdown.
    async fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

/// Idempotent Kafka producer writing to the DLQ topic
pub struct KafkaDeadLetterRouter {
    producer: FutureProducer,
    topic: String,
    delivery_timeout: Duration,
}

impl KafkaDeadLetterRouter {
    pub fn new(config: &AnalyticsConfig) -> Result<Self> {
        let delivery_timeout = config.dlq_delivery_timeout();
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka_brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "5")
            .set("message.timeout.ms", delivery_timeout.as_millis().to_string())
            .create()?;

        info!(
            brokers = %config.kafka_brokers,
            topic = %config.kafka_dlq_topic,
            "DLQ producer initialized"
        );

        Ok(Self {
            producer,
            topic: config.kafka_dlq_topic.clone(),
            delivery_timeout,
        })
    }
}

fn owned_headers(headers: &[MessageHeader]) -> OwnedHeaders {
    headers.iter().fold(OwnedHeaders::new(), |acc, h| {
        acc.insert(Header {
            key: &h.key,
            value: h.value.as_deref(),
        })
    })
}

#[async_trait]
impl DeadLetterRouter for KafkaDeadLetterRouter {
    async fn route(
        &self,
        payload: Option<&[u8]>,
        key: Option<&[u8]>,
        headers: &[MessageHeader],
    ) -> Result<()> {
        let mut record: FutureRecord<'_, [u8], [u8]> =
            FutureRecord::to(&self.topic).headers(owned_headers(headers));
        if let Some(payload) = payload {
            record = record.payload(payload);
        }
        if let Some(key) = key {
            record = record.key(key);
        }

        match self.producer.send(record, self.delivery_timeout).await {
            Ok((partition, offset)) => {
                warn!(
                    topic = %self.topic,
                    partition = partition,
                    offset = offset,
                    "Sent event to DLQ"
                );
                Ok(())
            }
            Err((err, _)) => {
                error!(topic = %self.topic, error = %err, "Failed to send event to DLQ");
                Err(AnalyticsError::Route(err.to_string()))
            }
        }
    }

    async fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout)?;
        Ok(())
    }
}
