use anyhow::Result;
use common::config::AppConfig;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use messaging::FeedConsumer;
use order_model::{CachedOrderModel, OrderModel};
use signal_hook::consts::signal::*;
use signal_hook_tokio::Signals;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

mod handlers;
mod ingest;
mod routes;
mod state;


use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    let telemetry_config = TelemetryConfig::for_service("order-service", &config.log_level);
    init_telemetry(telemetry_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    info!("Starting Order Service...");
    info!("Configuration:");
    info!("  Database URL: {}", config.database.redacted_url());
    info!("  Kafka Brokers: {}", config.kafka.brokers);
    info!("  Kafka Topic: {}", config.kafka.topic);
    info!("  Consumer Group: {}", config.kafka.consumer_group);
    info!("  HTTP Address: {}", config.http.addr);
    info!("  Dashboard: {}", config.http.static_dir.display());

    // Nothing is consumed or served until the cache is restored
    let model = CachedOrderModel::connect(&config.database)
        .await
        .map_err(|e| {
            error!("Failed to restore order cache: {}", e);
            e
        })?;
    let model: Arc<dyn OrderModel> = Arc::new(model);

    info!("Creating Kafka consumer...");
    let consumer = FeedConsumer::new(
        &config.kafka.brokers,
        &config.kafka.consumer_group,
        &config.kafka.topic,
    )?;

    // Setup signal handling
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals = Signals::new([SIGTERM, SIGINT])?;
    let handle = signals.handle();
    let signal_task = tokio::spawn(async move {
        use futures_util::stream::StreamExt;
        let mut signals = signals;
        while let Some(signal) = signals.next().await {
            match signal {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping...");
                    let _ = shutdown_tx.send(true);
                    break;
                }
                _ => {}
            }
        }
    });

    let ingest_task = tokio::spawn(ingest::run(
        consumer,
        Arc::clone(&model),
        shutdown_rx.clone(),
    ));

    let app = routes::create_router(
        AppState::new(Arc::clone(&model)),
        &config.http.static_dir,
    );
    let listener = tokio::net::TcpListener::bind(config.http.addr).await?;
    info!("Order service listening on {}", config.http.addr);

    let mut server_shutdown = shutdown_rx;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.changed().await;
        })
        .await;
    if let Err(e) = &served {
        error!("Server error: {}", e);
    }

    // Cleanup
    info!("Shutting down order service...");
    handle.close();
    let _ = signal_task.await;
    if let Err(e) = ingest_task.await {
        error!("Ingestion task failed: {}", e);
    }
    model.close().await;
    shutdown_telemetry();
    info!("Order service stopped");

    served?;
    Ok(())
}
