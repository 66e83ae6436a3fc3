use actix_web::{web, HttpResponse};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;

/// Connectivity check against the analytics store, run on every `/ready`.
#[async_trait]
pub trait StoragePing: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

/// Liveness of the consumer task, shared with the HTTP health routes.
///
/// Source transport faults are infrastructure problems, not event errors;
/// they only flip readiness.
#[derive(Clone, Default)]
pub struct ConsumerHealth {
    running: Arc<AtomicBool>,
    source_healthy: Arc<AtomicBool>,
}

impl ConsumerHealth {
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn set_source_healthy(&self, healthy: bool) {
        self.source_healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        self.is_running() && self.source_healthy.load(Ordering::SeqCst)
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

async fn ready(
    health: web::Data<ConsumerHealth>,
    storage: web::Data<dyn StoragePing>,
) -> HttpResponse {
    if !health.is_ready() {
        return HttpResponse::ServiceUnavailable().body("NOT READY");
    }
    if let Err(e) = storage.ping().await {
        warn!(error = %e, "Analytics store unreachable");
        return HttpResponse::ServiceUnavailable().body("NOT READY");
    }
    HttpResponse::Ok().body("READY")
}

/// Mount `/health`, `/ready` and `/metrics`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/ready", web::get().to(ready))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics));
}
