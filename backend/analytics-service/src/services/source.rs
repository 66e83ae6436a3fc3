//! Pull-based event source with explicit position commits

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message};
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::Offset;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::AnalyticsConfig;
use crate::error::Result;

/// Where a message sits in the log: topic, partition, offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionPosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// One header as received, value kept as raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

/// Owned copy of a consumed message; payload and key are never re-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
    pub headers: Vec<MessageHeader>,
    pub position: ConsumptionPosition,
}

impl SourceMessage {
    pub fn from_kafka<M: Message>(msg: &M) -> Self {
        let headers = msg
            .headers()
            .map(|headers| {
                headers
                    .iter()
                    .map(|h| MessageHeader {
                        key: h.key.to_string(),
                        value: h.value.map(|v| v.to_vec()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            key: msg.key().map(|k| k.to_vec()),
            payload: msg.payload().map(|p| p.to_vec()),
            headers,
            position: ConsumptionPosition {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
            },
        }
    }

    /// Key rendered for logs
    pub fn key_str(&self) -> String {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default()
    }
}

/// A partitioned log consumed one message at a time.
///
/// Commits are explicit; implementations must never auto-commit.
#[async_trait]
pub trait EventSource: Send {
    /// Wait up to `timeout` for the next message; `Ok(None)` when nothing arrived.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceMessage>>;

    /// Durably record that `position` is fully handled.
    async fn commit(&mut self, position: &ConsumptionPosition) -> Result<()>;

    /// Release the underlying connection.
    fn close(&mut self) {}
}

/// Kafka source with manual offset commits
pub struct KafkaEventSource {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaEventSource {
    pub fn new(config: &AnalyticsConfig) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &config.kafka_group_id)
            .set("bootstrap.servers", &config.kafka_brokers)
            .set("enable.auto.commit", "false") // Commit only after a terminal outcome
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "3000")
            .set("max.poll.interval.ms", "300000") // 5 minutes
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| {
                error!("Failed to create Kafka consumer: {}", e);
                e
            })?;

        consumer.subscribe(&[&config.kafka_topic]).map_err(|e| {
            error!("Failed to subscribe to topic: {}", e);
            e
        })?;

        info!(
            brokers = %config.kafka_brokers,
            topic = %config.kafka_topic,
            group_id = %config.kafka_group_id,
            "Loan events consumer subscribed"
        );

        Ok(Self {
            consumer,
            topic: config.kafka_topic.clone(),
        })
    }
}

#[async_trait]
impl EventSource for KafkaEventSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceMessage>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(msg)) => {
                debug!(
                    topic = msg.topic(),
                    partition = msg.partition(),
                    offset = msg.offset(),
                    "Received message"
                );
                Ok(Some(SourceMessage::from_kafka(&msg)))
            }
            Ok(Err(e)) => Err(e.into()),
        }
    }

    async fn commit(&mut self, position: &ConsumptionPosition) -> Result<()> {
        let mut tpl = TopicPartitionList::new();
        // Kafka commits the next offset to read
        tpl.add_partition_offset(
            &position.topic,
            position.partition,
            Offset::Offset(position.offset + 1),
        )?;
        self.consumer.commit(&tpl, CommitMode::Sync)?;

        debug!(
            topic = %position.topic,
            partition = position.partition,
            offset = position.offset,
            "Committed position"
        );
        Ok(())
    }

    fn close(&mut self) {
        self.consumer.unsubscribe();
        info!(topic = %self.topic, "Loan events consumer unsubscribed");
    }
}
