//! In-memory source, sink and router for driving the consumer without Kafka
//! or PostgreSQL.

#![allow(dead_code)]

use analytics_service::config::DlqFailurePolicy;
use analytics_service::error::{AnalyticsError, Result};
use analytics_service::health::ConsumerHealth;
use analytics_service::metrics::ConsumerMetrics;
use analytics_service::services::{
    ConsumerWorker, ConsumptionPosition, DeadLetterRouter, EventSource, MessageHeader,
    SourceMessage, WorkerSettings,
};
use async_trait::async_trait;
use event_schema::LoanCreatedEvent;
use idempotent_consumer::{IdempotencyError, IdempotencyResult, IdempotentSink, PersistOutcome};
use prometheus::Registry;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use resilience::RetryPolicy;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub const TOPIC: &str = "loan_events";

pub fn loan_payload(loan_id: i32) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "LoanId": loan_id,
        "UserId": 7,
        "Amount": 1500.5,
        "CreatedAt": "2024-03-01T12:00:00Z"
    }))
    .unwrap()
}

pub fn raw_message(payload: Option<Vec<u8>>, key: &str, offset: i64) -> SourceMessage {
    SourceMessage {
        key: Some(key.as_bytes().to_vec()),
        payload,
        headers: vec![MessageHeader {
            key: "traceparent".to_string(),
            value: Some(format!("00-trace-{}-01", offset).into_bytes()),
        }],
        position: ConsumptionPosition {
            topic: TOPIC.to_string(),
            partition: 0,
            offset,
        },
    }
}

pub fn loan_message(loan_id: i32, offset: i64) -> SourceMessage {
    raw_message(Some(loan_payload(loan_id)), &loan_id.to_string(), offset)
}

enum Scripted {
    Message(SourceMessage),
    PollError,
}

/// Replays a fixed queue of messages and records commits.
///
/// With a stop handle attached, the source flips the shutdown flag once
/// the queue is drained.
pub struct MemorySource {
    queue: VecDeque<Scripted>,
    committed: Arc<Mutex<Vec<ConsumptionPosition>>>,
    stop_when_drained: Option<watch::Sender<bool>>,
}

impl MemorySource {
    pub fn new(messages: Vec<SourceMessage>) -> Self {
        Self {
            queue: messages.into_iter().map(Scripted::Message).collect(),
            committed: Arc::new(Mutex::new(Vec::new())),
            stop_when_drained: None,
        }
    }

    pub fn stop_when_drained(mut self, stop: watch::Sender<bool>) -> Self {
        self.stop_when_drained = Some(stop);
        self
    }

    /// Fail the next poll with a transport error.
    pub fn poll_error_first(mut self) -> Self {
        self.queue.push_front(Scripted::PollError);
        self
    }

    pub fn commits(&self) -> Arc<Mutex<Vec<ConsumptionPosition>>> {
        Arc::clone(&self.committed)
    }
}

#[async_trait]
impl EventSource for MemorySource {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<SourceMessage>> {
        match self.queue.pop_front() {
            Some(Scripted::Message(message)) => Ok(Some(message)),
            Some(Scripted::PollError) => Err(AnalyticsError::Kafka(KafkaError::MessageConsumption(
                RDKafkaErrorCode::BrokerTransportFailure,
            ))),
            None => {
                if let Some(stop) = &self.stop_when_drained {
                    let _ = stop.send(true);
                    return Ok(None);
                }
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn commit(&mut self, position: &ConsumptionPosition) -> Result<()> {
        self.committed.lock().unwrap().push(position.clone());
        Ok(())
    }
}

#[derive(Default)]
struct SinkState {
    rows: HashMap<i32, LoanCreatedEvent>,
    failures: HashMap<i32, u32>,
    stalled: Vec<i32>,
    calls: Vec<(i32, Instant)>,
}

/// Keyed store with scripted failures, mirroring ON CONFLICT DO NOTHING.
#[derive(Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
}

impl MemorySink {
    /// Fail the next `times` writes for `loan_id`.
    pub fn fail_times(&self, loan_id: i32, times: u32) {
        self.state.lock().unwrap().failures.insert(loan_id, times);
    }

    /// Writes for `loan_id` never complete.
    pub fn stall(&self, loan_id: i32) {
        self.state.lock().unwrap().stalled.push(loan_id);
    }

    pub fn row(&self, loan_id: i32) -> Option<LoanCreatedEvent> {
        self.state.lock().unwrap().rows.get(&loan_id).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    pub fn calls_for(&self, loan_id: i32) -> Vec<Instant> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(id, _)| *id == loan_id)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl IdempotentSink for MemorySink {
    type Event = LoanCreatedEvent;

    async fn persist(&self, event: &LoanCreatedEvent) -> IdempotencyResult<PersistOutcome> {
        let stalled = {
            let mut state = self.state.lock().unwrap();
            state.calls.push((event.loan_id, Instant::now()));
            state.stalled.contains(&event.loan_id)
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.failures.get_mut(&event.loan_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(IdempotencyError::Unavailable(
                    "connection refused".to_string(),
                ));
            }
        }

        if state.rows.contains_key(&event.loan_id) {
            return Ok(PersistOutcome::Duplicate);
        }
        state.rows.insert(event.loan_id, event.clone());
        Ok(PersistOutcome::Inserted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    pub payload: Option<Vec<u8>>,
    pub key: Option<Vec<u8>>,
    pub headers: Vec<MessageHeader>,
}

#[derive(Default)]
struct RouterState {
    routed: Vec<RoutedMessage>,
    failures: u32,
    publish_attempts: u32,
    flushed: bool,
    flush_fails: bool,
}

/// Records dead-lettered messages; can be scripted to reject publishes.
#[derive(Clone, Default)]
pub struct MemoryRouter {
    state: Arc<Mutex<RouterState>>,
}

impl MemoryRouter {
    pub fn fail_times(&self, times: u32) {
        self.state.lock().unwrap().failures = times;
    }

    /// Flush reports undelivered messages at shutdown.
    pub fn fail_flush(&self) {
        self.state.lock().unwrap().flush_fails = true;
    }

    pub fn routed(&self) -> Vec<RoutedMessage> {
        self.state.lock().unwrap().routed.clone()
    }

    pub fn publish_attempts(&self) -> u32 {
        self.state.lock().unwrap().publish_attempts
    }

    pub fn flushed(&self) -> bool {
        self.state.lock().unwrap().flushed
    }
}

#[async_trait]
impl DeadLetterRouter for MemoryRouter {
    async fn route(
        &self,
        payload: Option<&[u8]>,
        key: Option<&[u8]>,
        headers: &[MessageHeader],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.publish_attempts += 1;
        if state.failures > 0 {
            state.failures -= 1;
            return Err(AnalyticsError::Route("broker unavailable".to_string()));
        }
        state.routed.push(RoutedMessage {
            payload: payload.map(|p| p.to_vec()),
            key: key.map(|k| k.to_vec()),
            headers: headers.to_vec(),
        });
        Ok(())
    }

    async fn flush(&self, _timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.flushed = true;
        if state.flush_fails {
            return Err(AnalyticsError::Route(
                "1 message still queued after flush timeout".to_string(),
            ));
        }
        Ok(())
    }
}

pub type MemoryWorker = ConsumerWorker<MemorySource, MemorySink, MemoryRouter>;

pub struct Harness {
    pub worker: MemoryWorker,
    pub sink: MemorySink,
    pub router: MemoryRouter,
    pub commits: Arc<Mutex<Vec<ConsumptionPosition>>>,
    pub metrics: ConsumerMetrics,
    pub health: ConsumerHealth,
}

pub fn settings(max_attempts: u32, base_delay_ms: u64, dlq: DlqFailurePolicy) -> WorkerSettings {
    WorkerSettings {
        retry_policy: RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms)),
        poll_timeout: Duration::from_millis(100),
        dlq_failure_policy: dlq,
        flush_timeout: Duration::from_millis(100),
    }
}

pub fn harness(
    source: MemorySource,
    settings: WorkerSettings,
    shutdown: watch::Receiver<bool>,
) -> Harness {
    let sink = MemorySink::default();
    let router = MemoryRouter::default();
    let commits = source.commits();
    let metrics = ConsumerMetrics::new(&Registry::new()).unwrap();
    let health = ConsumerHealth::default();

    let worker = ConsumerWorker::new(
        source,
        sink.clone(),
        router.clone(),
        settings,
        metrics.clone(),
        health.clone(),
        shutdown,
    );

    Harness {
        worker,
        sink,
        router,
        commits,
        metrics,
        health,
    }
}

pub fn committed_offsets(commits: &Arc<Mutex<Vec<ConsumptionPosition>>>) -> Vec<i64> {
    commits.lock().unwrap().iter().map(|p| p.offset).collect()
}

pub fn assert_close(actual: Duration, expected_ms: u64) {
    let expected = Duration::from_millis(expected_ms);
    let tolerance = Duration::from_millis(5);
    assert!(
        actual >= expected && actual <= expected + tolerance,
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}
