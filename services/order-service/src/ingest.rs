use common::metrics::{self, IngestOutcome};
use domain::Order;
use messaging::{ConsumerError, FeedConsumer};
use order_model::{OrderModel, OrderModelError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Decode, validate and insert one feed payload
pub async fn handle_payload(model: &dyn OrderModel, payload: &[u8]) -> IngestOutcome {
    let order = match Order::from_json(payload) {
        Ok(order) => order,
        Err(e) => {
            warn!("Skipping invalid order payload: {}", e);
            return IngestOutcome::Invalid;
        }
    };

    let uid = order.uid.clone();
    match model.insert(order).await {
        Ok(()) => IngestOutcome::Inserted,
        Err(OrderModelError::DuplicateKey(_)) => {
            info!("Order {} already ingested", uid);
            IngestOutcome::Duplicate
        }
        Err(e) => {
            error!("Failed to ingest order {}: {}", uid, e);
            IngestOutcome::Failed
        }
    }
}

/// Consume the order feed until `shutdown` flips to `true`
pub async fn run(
    consumer: FeedConsumer,
    model: Arc<dyn OrderModel>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Starting ingestion from {}...", consumer.topic());

    loop {
        let message = tokio::select! {
            _ = shutdown.changed() => break,
            message = consumer.recv() => message,
        };

        match message {
            Ok(message) => {
                let outcome = handle_payload(model.as_ref(), &message.payload).await;
                metrics::record_ingest(outcome);
            }
            Err(ConsumerError::NoPayload { partition, offset }) => {
                warn!("Skipping empty message at {}:{}", partition, offset);
                metrics::record_ingest(IngestOutcome::Invalid);
            }
            Err(e) => {
                error!("Error receiving from Kafka: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    consumer.unsubscribe();
    info!("Ingestion stopped");
}
