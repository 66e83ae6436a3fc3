/// HTTP handlers for loan-service
use actix_web::{http::header, web, HttpResponse};
use event_schema::LoanCreatedEvent;
use rust_decimal::Decimal;
use tracing::error;

use crate::error::{LoanError, Result};
use crate::metrics::LoanMetrics;
use crate::models::{CreateLoanRequest, LoanResponse};
use crate::producer::LoanEventPublisher;
use crate::repository::LoanStore;

/// Store a loan, then publish its `LoanCreatedEvent`.
///
/// The row is written first; a publish failure after a successful insert
/// still reports 500 so the client can tell the event was not emitted.
pub async fn create_loan(
    store: web::Data<dyn LoanStore>,
    publisher: web::Data<dyn LoanEventPublisher>,
    metrics: web::Data<LoanMetrics>,
    req: web::Json<CreateLoanRequest>,
) -> Result<HttpResponse> {
    if req.amount <= Decimal::ZERO {
        return Err(LoanError::Validation("Amount must be positive".to_string()));
    }

    match store_and_publish(store.get_ref(), publisher.get_ref(), &req).await {
        Ok(loan) => {
            metrics.record_created(true);
            Ok(HttpResponse::Created()
                .insert_header((header::LOCATION, format!("/api/loans/{}", loan.id)))
                .json(loan))
        }
        Err(e) => {
            error!(user_id = req.user_id, error = %e, "Failed to create loan");
            metrics.record_created(false);
            Err(e)
        }
    }
}

async fn store_and_publish(
    store: &dyn LoanStore,
    publisher: &dyn LoanEventPublisher,
    request: &CreateLoanRequest,
) -> Result<LoanResponse> {
    let loan = store.create(request).await?;
    publisher
        .publish_loan_created(&LoanCreatedEvent::from(&loan))
        .await?;
    Ok(loan)
}

pub async fn health(store: web::Data<dyn LoanStore>) -> HttpResponse {
    match store.ping().await {
        Ok(()) => HttpResponse::Ok().body("Healthy"),
        Err(e) => {
            error!(error = %e, "Database health check failed");
            HttpResponse::ServiceUnavailable().body("Unhealthy")
        }
    }
}

/// Mount the loan API plus `/health` and `/metrics`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| LoanError::Validation(err.to_string()).into()),
    )
    .route("/api/loans", web::post().to(create_loan))
    .route("/health", web::get().to(health))
    .route("/metrics", web::get().to(crate::metrics::serve_metrics));
}
