use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use loan_service::config::LoanConfig;
use loan_service::handlers;
use loan_service::metrics::LoanMetrics;
use loan_service::producer::{KafkaLoanEventProducer, LoanEventPublisher};
use loan_service::repository::{LoanStore, PgLoanRepository};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,loan_service=debug".into());

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    init_tracing();

    tracing::info!("Starting loan-service");

    let config = LoanConfig::from_env().context("Failed to load configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations completed successfully");

    let registry = prometheus::default_registry().clone();
    let metrics = LoanMetrics::new(&registry).context("Failed to register metrics")?;

    let producer = Arc::new(
        KafkaLoanEventProducer::new(&config).context("Failed to create Kafka producer")?,
    );
    let store: Arc<dyn LoanStore> = Arc::new(PgLoanRepository::new(db_pool.clone()));
    let publisher: Arc<dyn LoanEventPublisher> = producer.clone();

    let store_data = web::Data::from(store);
    let publisher_data = web::Data::from(publisher);
    let metrics_data = web::Data::new(metrics);
    let registry_data = web::Data::new(registry);

    let http_port = config.loan_service_port;
    tracing::info!("Starting HTTP server on port {}", http_port);

    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(store_data.clone())
            .app_data(publisher_data.clone())
            .app_data(metrics_data.clone())
            .app_data(registry_data.clone())
            .configure(handlers::configure)
    })
    .bind(("0.0.0.0", http_port))
    .context("Failed to bind HTTP server")?
    .run()
    .await;

    tracing::info!("HTTP server stopped, flushing producer");
    if let Err(e) = producer.flush(Duration::from_secs(5)) {
        tracing::error!("Failed to flush Kafka producer: {}", e);
    }
    db_pool.close().await;

    server_result.context("HTTP server error")
}
