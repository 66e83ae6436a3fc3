use actix_web::{web, App, HttpServer};
use analytics_service::config::AnalyticsConfig;
use analytics_service::health::{self, ConsumerHealth, StoragePing};
use analytics_service::metrics::ConsumerMetrics;
use analytics_service::services::{
    AnalyticsRepository, ConsumerWorker, KafkaDeadLetterRouter, KafkaEventSource, WorkerSettings,
};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,analytics_service=debug".into());

    // JSON output for log aggregation, human-readable otherwise
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

    tracing::info!("Starting analytics-service");

    let config = AnalyticsConfig::from_env().context("Failed to load configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database pool created successfully");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations completed successfully");

    let registry = prometheus::default_registry().clone();
    let metrics = ConsumerMetrics::new(&registry).context("Failed to register metrics")?;
    let consumer_health = ConsumerHealth::default();

    let source = KafkaEventSource::new(&config).context("Failed to create Kafka consumer")?;
    let router = KafkaDeadLetterRouter::new(&config).context("Failed to create DLQ producer")?;
    let repository = AnalyticsRepository::new(db_pool.clone());

    let storage_data: web::Data<dyn StoragePing> =
        web::Data::from(Arc::new(repository.clone()) as Arc<dyn StoragePing>);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = ConsumerWorker::new(
        source,
        repository,
        router,
        WorkerSettings::from_config(&config),
        metrics,
        consumer_health.clone(),
        shutdown_rx,
    );
    let worker_handle = tokio::spawn(async move {
        tracing::info!("Consumer task started");
        if let Err(e) = worker.run().await {
            tracing::error!("Consumer task failed: {:?}", e);
        }
    });

    let http_port = config.analytics_service_port;
    tracing::info!("Starting HTTP server on port {}", http_port);

    let health_data = web::Data::new(consumer_health);
    let registry_data = web::Data::new(registry);

    // actix handles SIGINT/SIGTERM; returning from run() starts consumer shutdown
    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(health_data.clone())
            .app_data(storage_data.clone())
            .app_data(registry_data.clone())
            .configure(health::configure)
    })
    .bind(("0.0.0.0", http_port))
    .context("Failed to bind HTTP server")?
    .run()
    .await;

    tracing::info!("HTTP server stopped, stopping consumer");
    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        tracing::error!("Consumer task panicked: {:?}", e);
    }

    db_pool.close().await;
    tracing::info!("analytics-service shut down");

    server_result.context("HTTP server error")
}
