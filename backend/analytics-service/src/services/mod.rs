pub mod consumer;
pub mod dlq;
pub mod repository;
pub mod source;

pub use consumer::{ConsumerWorker, MessageOutcome, WorkerSettings};
pub use dlq::{DeadLetterRouter, KafkaDeadLetterRouter};
pub use repository::AnalyticsRepository;
pub use source::{ConsumptionPosition, EventSource, KafkaEventSource, MessageHeader, SourceMessage};
