use actix_web::{web, HttpResponse};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// `loans_created_total{status="success"|"error"}`
#[derive(Clone)]
pub struct LoanMetrics {
    created: IntCounterVec,
}

impl LoanMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let created = IntCounterVec::new(
            Opts::new("loans_created_total", "Total loans created"),
            &["status"],
        )?;
        registry.register(Box::new(created.clone()))?;
        Ok(Self { created })
    }

    pub fn record_created(&self, success: bool) {
        self.created
            .with_label_values(&[status_label(success)])
            .inc();
    }

    pub fn created_count(&self, success: bool) -> u64 {
        self.created.with_label_values(&[status_label(success)]).get()
    }
}

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

pub async fn serve_metrics(registry: web::Data<Registry>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&registry.gather(), &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
