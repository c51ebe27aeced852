use anyhow::Result;
use common::config::AppConfig;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use messaging::FeedPublisher;
use tracing::{error, info};

mod generator;

use generator::{Corruption, OrderGenerator};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    let telemetry_config = TelemetryConfig::for_service("order-publisher", &config.log_level);
    init_telemetry(telemetry_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    info!("Starting Order Publisher...");
    info!("  Kafka Brokers: {}", config.kafka.brokers);
    info!("  Kafka Topic: {}", config.kafka.topic);

    let publisher = FeedPublisher::new(&config.kafka.brokers, config.kafka.topic.clone())?;
    let mut generator = OrderGenerator::new(rand::thread_rng());

    let total = generator.batch_size();
    info!("Publishing {} orders to {}", total, publisher.topic());

    let (mut published, mut corrupted) = (0usize, 0usize);
    for _ in 0..total {
        let payload = generator.next_payload()?;
        if payload.corruption != Corruption::None {
            corrupted += 1;
            info!("Order {} published with {:?}", payload.key, payload.corruption);
        }

        match publisher.publish_raw(&payload.key, &payload.bytes).await {
            Ok(()) => published += 1,
            Err(e) => error!("Failed to publish order {}: {}", payload.key, e),
        }
    }

    info!(
        "Published {}/{} orders ({} corrupted)",
        published, total, corrupted
    );

    shutdown_telemetry();
    Ok(())
}
