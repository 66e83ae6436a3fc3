//! HTTP behaviour of `POST /api/loans` with in-memory storage and publisher.

use actix_web::{http::header, test, web, App};
use async_trait::async_trait;
use chrono::Utc;
use event_schema::LoanCreatedEvent;
use loan_service::error::{LoanError, Result};
use loan_service::handlers;
use loan_service::metrics::LoanMetrics;
use loan_service::models::{CreateLoanRequest, LoanResponse};
use loan_service::producer::LoanEventPublisher;
use loan_service::repository::LoanStore;
use prometheus::Registry;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MemoryLoanStore {
    loans: Mutex<Vec<LoanResponse>>,
    fail: AtomicBool,
}

#[async_trait]
impl LoanStore for MemoryLoanStore {
    async fn create(&self, request: &CreateLoanRequest) -> Result<LoanResponse> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LoanError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut loans = self.loans.lock().unwrap();
        let loan = LoanResponse {
            id: loans.len() as i32 + 1,
            user_id: request.user_id,
            amount: request.amount,
            status: "pending".to_string(),
            created_at: Utc::now(),
        };
        loans.push(loan.clone());
        Ok(loan)
    }

    async fn ping(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LoanError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    fail: AtomicBool,
}

#[async_trait]
impl LoanEventPublisher for RecordingPublisher {
    async fn publish_loan_created(&self, event: &LoanCreatedEvent) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LoanError::Kafka(rdkafka::error::KafkaError::Canceled));
        }
        self.published
            .lock()
            .unwrap()
            .push((event.partition_key(), event.to_payload()?));
        Ok(())
    }
}

struct Fixture {
    store: Arc<MemoryLoanStore>,
    publisher: Arc<RecordingPublisher>,
    metrics: LoanMetrics,
    registry: Registry,
}

impl Fixture {
    fn new() -> Self {
        let registry = Registry::new();
        Self {
            store: Arc::new(MemoryLoanStore::default()),
            publisher: Arc::new(RecordingPublisher::default()),
            metrics: LoanMetrics::new(&registry).unwrap(),
            registry,
        }
    }

    fn app(
        &self,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let store: Arc<dyn LoanStore> = self.store.clone();
        let publisher: Arc<dyn LoanEventPublisher> = self.publisher.clone();
        App::new()
            .app_data(web::Data::from(store))
            .app_data(web::Data::from(publisher))
            .app_data(web::Data::new(self.metrics.clone()))
            .app_data(web::Data::new(self.registry.clone()))
            .configure(handlers::configure)
    }
}

#[actix_web::test]
async fn test_create_loan_stores_and_publishes() {
    let fixture = Fixture::new();
    let app = test::init_service(fixture.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/loans")
        .set_json(json!({"UserId": 7, "Amount": 1500.50}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 201);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/api/loans/1"
    );

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["Id"], 1);
    assert_eq!(body["UserId"], 7);
    assert_eq!(body["Amount"], 1500.5);
    assert_eq!(body["Status"], "pending");

    let published = fixture.publisher.published.lock().unwrap().clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "1");
    let event = LoanCreatedEvent::from_payload(&published[0].1).unwrap();
    assert_eq!(event.loan_id, 1);
    assert_eq!(event.user_id, 7);

    assert_eq!(fixture.metrics.created_count(true), 1);
}

#[actix_web::test]
async fn test_non_positive_amount_rejected() {
    let fixture = Fixture::new();
    let app = test::init_service(fixture.app()).await;

    for amount in [json!(0), json!(-10.5)] {
        let req = test::TestRequest::post()
            .uri("/api/loans")
            .set_json(json!({"UserId": 1, "Amount": amount}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Amount must be positive"}));
    }

    assert!(fixture.store.loans.lock().unwrap().is_empty());
    assert!(fixture.publisher.published.lock().unwrap().is_empty());
    assert_eq!(fixture.metrics.created_count(false), 0);
}

#[actix_web::test]
async fn test_malformed_body_is_bad_request() {
    let fixture = Fixture::new();
    let app = test::init_service(fixture.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/loans")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload(r#"{"UserId": "seven"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_publish_failure_is_internal_error() {
    let fixture = Fixture::new();
    fixture.publisher.fail.store(true, Ordering::SeqCst);
    let app = test::init_service(fixture.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/loans")
        .set_json(json!({"UserId": 3, "Amount": 100}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Internal server error"}));
    assert_eq!(fixture.metrics.created_count(false), 1);
    assert_eq!(fixture.metrics.created_count(true), 0);
}

#[actix_web::test]
async fn test_storage_failure_skips_publish() {
    let fixture = Fixture::new();
    fixture.store.fail.store(true, Ordering::SeqCst);
    let app = test::init_service(fixture.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/loans")
        .set_json(json!({"UserId": 3, "Amount": 100}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 500);
    assert!(fixture.publisher.published.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn test_health_tracks_database() {
    let fixture = Fixture::new();
    let app = test::init_service(fixture.app()).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    fixture.store.fail.store(true, Ordering::SeqCst);
    let req = test::TestRequest::get().uri("/health").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 503);
}

#[actix_web::test]
async fn test_metrics_endpoint_exposes_counter() {
    let fixture = Fixture::new();
    let app = test::init_service(fixture.app()).await;

    let req = test::TestRequest::post()
        .uri("/api/loans")
        .set_json(json!({"UserId": 1, "Amount": 10}))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let body = test::call_and_read_body(&app, req).await;
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains(r#"loans_created_total{status="success"} 1"#));
}
