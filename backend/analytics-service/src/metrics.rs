use actix_web::{web, HttpResponse};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters emitted by the consumption loop.
///
/// Cloning shares the underlying atomics, so several workers may increment
/// the same counters.
#[derive(Clone)]
pub struct ConsumerMetrics {
    processed: IntCounterVec,
    failed: IntCounter,
}

impl ConsumerMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let processed = IntCounterVec::new(
            Opts::new("events_processed_total", "Total events processed"),
            &["duplicate"],
        )?;
        let failed = IntCounter::with_opts(Opts::new(
            "events_failed_total",
            "Total events failed",
        ))?;

        registry.register(Box::new(processed.clone()))?;
        registry.register(Box::new(failed.clone()))?;

        Ok(Self { processed, failed })
    }

    pub fn record_processed(&self, duplicate: bool) {
        self.processed
            .with_label_values(&[if duplicate { "true" } else { "false" }])
            .inc();
    }

    pub fn record_failed(&self) {
        self.failed.inc();
    }

    pub fn processed_count(&self, duplicate: bool) -> u64 {
        self.processed
            .with_label_values(&[if duplicate { "true" } else { "false" }])
            .get()
    }

    pub fn failed_count(&self) -> u64 {
        self.failed.get()
    }
}

pub async fn serve_metrics(registry: web::Data<Registry>) -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
