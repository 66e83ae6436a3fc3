//! Loan events consumption loop
//!
//! Messages are handled strictly one at a time:
//!
//! ```text
//! Received → Attempting(1..=max) → Succeeded    → commit
//!                               ↘ DeadLettered → commit
//! ```
//!
//! The position is committed only from the two terminal branches. A crash
//! while attempting leaves the offset uncommitted, the message is redelivered
//! on restart, and the idempotent sink reports the replay as a duplicate.

use event_schema::LoanCreatedEvent;
use idempotent_consumer::{IdempotentSink, PersistOutcome};
use resilience::{cancelled, wait_or_cancel, RetryDecision, RetryPolicy, WaitOutcome};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::dlq::DeadLetterRouter;
use super::source::{ConsumptionPosition, EventSource, SourceMessage};
use crate::config::{AnalyticsConfig, DlqFailurePolicy};
use crate::error::{AnalyticsError, Result};
use crate::health::ConsumerHealth;
use crate::metrics::ConsumerMetrics;

/// Tuning for [`ConsumerWorker`]
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub retry_policy: RetryPolicy,
    /// Upper bound on a single poll; also bounds shutdown latency
    pub poll_timeout: Duration,
    pub dlq_failure_policy: DlqFailurePolicy,
    /// How long to wait for in-flight DLQ publishes on shutdown
    pub flush_timeout: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            retry_policy: config.retry_policy(),
            poll_timeout: config.poll_timeout(),
            dlq_failure_policy: config.dlq_failure_policy,
            flush_timeout: config.dlq_delivery_timeout(),
        }
    }
}

/// How a single message was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Sink accepted the event (fresh insert or duplicate); position committed
    Persisted { duplicate: bool, attempts: u32 },
    /// Retry budget exhausted; `routed` is false when the DLQ publish failed
    /// and the position was advanced anyway
    DeadLettered { routed: bool, attempts: u32 },
    /// Shutdown arrived before a terminal state; position not committed
    Interrupted,
}

enum AttemptResult {
    Done(PersistOutcome),
    Failed(AnalyticsError),
    Interrupted,
}

/// Single-partition consumer driving the retry policy around the sink.
pub struct ConsumerWorker<S, K, R> {
    source: S,
    sink: K,
    router: R,
    settings: WorkerSettings,
    metrics: ConsumerMetrics,
    health: ConsumerHealth,
    shutdown: watch::Receiver<bool>,
}

impl<S, K, R> ConsumerWorker<S, K, R>
where
    S: EventSource,
    K: IdempotentSink<Event = LoanCreatedEvent>,
    R: DeadLetterRouter,
{
    pub fn new(
        source: S,
        sink: K,
        router: R,
        settings: WorkerSettings,
        metrics: ConsumerMetrics,
        health: ConsumerHealth,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            sink,
            router,
            settings,
            metrics,
            health,
            shutdown,
        }
    }

    fn is_stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run until the shutdown flag flips, then flush the DLQ producer and
    /// release the source. A failed flush is returned after the source is
    /// released, since dead letters may still be queued in the producer.
    pub async fn run(mut self) -> Result<()> {
        info!(
            max_attempts = self.settings.retry_policy.max_attempts(),
            base_delay_ms = self.settings.retry_policy.base_delay().as_millis() as u64,
            "Starting loan events consumer loop"
        );
        self.health.set_running(true);
        self.health.set_source_healthy(true);

        while !self.is_stopping() {
            let polled = tokio::select! {
                biased;
                _ = cancelled(&mut self.shutdown) => break,
                polled = self.source.poll(self.settings.poll_timeout) => polled,
            };

            match polled {
                Ok(Some(message)) => {
                    self.health.set_source_healthy(true);
                    if self.process_message(&message).await == MessageOutcome::Interrupted {
                        info!(
                            partition = message.position.partition,
                            offset = message.position.offset,
                            "Shutdown before terminal outcome, message left uncommitted"
                        );
                        break;
                    }
                }
                Ok(None) => self.health.set_source_healthy(true),
                Err(e) => {
                    error!(error = %e, "Kafka consume error");
                    self.health.set_source_healthy(false);
                    // Sleep briefly before polling again to avoid a tight error loop
                    if wait_or_cancel(self.settings.poll_timeout, &mut self.shutdown).await
                        == WaitOutcome::Cancelled
                    {
                        break;
                    }
                }
            }
        }

        self.health.set_running(false);
        let flushed = self.router.flush(self.settings.flush_timeout).await;
        if let Err(e) = &flushed {
            error!(error = %e, "Failed to flush DLQ producer");
        }
        self.source.close();

        info!("Loan events consumer stopped");
        flushed
    }

    /// Drive one message to a terminal state (or to interruption).
    pub async fn process_message(&mut self, message: &SourceMessage) -> MessageOutcome {
        let max_attempts = self.settings.retry_policy.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.attempt(message).await {
                AttemptResult::Done(outcome) => {
                    let duplicate = outcome.is_duplicate();
                    self.metrics.record_processed(duplicate);
                    self.commit(&message.position).await;

                    info!(
                        key = %message.key_str(),
                        attempt = attempt,
                        duplicate = duplicate,
                        "Event processed"
                    );
                    return MessageOutcome::Persisted {
                        duplicate,
                        attempts: attempt,
                    };
                }
                AttemptResult::Interrupted => return MessageOutcome::Interrupted,
                AttemptResult::Failed(e) => {
                    warn!(
                        key = %message.key_str(),
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %e,
                        "Processing failed"
                    );

                    match self.settings.retry_policy.next(attempt) {
                        RetryDecision::RetryAfter(delay) => {
                            debug!(key = %message.key_str(), ?delay, "Backing off before retry");
                            if wait_or_cancel(delay, &mut self.shutdown).await
                                == WaitOutcome::Cancelled
                            {
                                return MessageOutcome::Interrupted;
                            }
                        }
                        RetryDecision::Exhausted => {
                            return self.dead_letter(message, attempt).await;
                        }
                    }
                }
            }
        }
    }

    /// Decode and persist once. Decoding happens per attempt so a malformed
    /// payload spends the budget like any other failure.
    async fn attempt(&mut self, message: &SourceMessage) -> AttemptResult {
        let event =
            match LoanCreatedEvent::from_payload(message.payload.as_deref().unwrap_or_default()) {
                Ok(event) => event,
                Err(e) => return AttemptResult::Failed(e.into()),
            };

        tokio::select! {
            biased;
            _ = cancelled(&mut self.shutdown) => AttemptResult::Interrupted,
            result = self.sink.persist(&event) => match result {
                Ok(outcome) => AttemptResult::Done(outcome),
                Err(e) => {
                    debug!(loan_id = event.loan_id, transient = e.is_transient(), "Sink write failed");
                    AttemptResult::Failed(e.into())
                }
            },
        }
    }

    async fn dead_letter(&mut self, message: &SourceMessage, attempts: u32) -> MessageOutcome {
        let routed = match self.settings.dlq_failure_policy {
            DlqFailurePolicy::Advance => match self.publish_dead_letter(message).await {
                None => return MessageOutcome::Interrupted,
                Some(Ok(())) => true,
                Some(Err(e)) => {
                    error!(
                        key = %message.key_str(),
                        partition = message.position.partition,
                        offset = message.position.offset,
                        error = %e,
                        "Dead-letter publish failed, advancing past message"
                    );
                    false
                }
            },
            DlqFailurePolicy::RetryUntilDelivered => {
                if !self.publish_until_delivered(message).await {
                    return MessageOutcome::Interrupted;
                }
                true
            }
        };

        self.metrics.record_failed();
        // Commit either way so one poison message cannot block the partition
        self.commit(&message.position).await;

        if routed {
            error!(
                key = %message.key_str(),
                attempts = attempts,
                "Event sent to DLQ after exhausting retries"
            );
        }
        MessageOutcome::DeadLettered { routed, attempts }
    }

    /// One publish of the original bytes; `None` when shutdown won the race.
    async fn publish_dead_letter(&mut self, message: &SourceMessage) -> Option<Result<()>> {
        tokio::select! {
            biased;
            _ = cancelled(&mut self.shutdown) => None,
            result = self.router.route(
                message.payload.as_deref(),
                message.key.as_deref(),
                &message.headers,
            ) => Some(result),
        }
    }

    /// Returns false if shutdown interrupted before delivery.
    async fn publish_until_delivered(&mut self, message: &SourceMessage) -> bool {
        let cap = self
            .settings
            .retry_policy
            .max_attempts()
            .saturating_sub(1)
            .max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.publish_dead_letter(message).await {
                None => return false,
                Some(Ok(())) => return true,
                Some(Err(e)) => {
                    let delay = self.settings.retry_policy.delay_for(attempt.min(cap));
                    error!(
                        key = %message.key_str(),
                        attempt = attempt,
                        ?delay,
                        error = %e,
                        "Dead-letter publish failed, retrying"
                    );
                    if wait_or_cancel(delay, &mut self.shutdown).await == WaitOutcome::Cancelled {
                        return false;
                    }
                }
            }
        }
    }

    async fn commit(&mut self, position: &ConsumptionPosition) {
        if let Err(e) = self.source.commit(position).await {
            error!(
                topic = %position.topic,
                partition = position.partition,
                offset = position.offset,
                error = %e,
                "Failed to commit position, message will be redelivered"
            );
        }
    }
}
