use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Failed to create Kafka producer: {0}")]
    ProducerCreation(String),

    #[error("Failed to publish message: {0}")]
    PublishFailed(String),
}

/// Kafka publisher for the order feed
pub struct FeedPublisher {
    producer: FutureProducer,
    topic: String,
}

impl FeedPublisher {
    /// Create a new FeedPublisher
    ///
    /// # Arguments
    /// * `brokers` - Comma-separated list of Kafka brokers (e.g., "localhost:9092")
    /// * `topic` - The topic to publish to
    ///
    /// # Example
    /// ```no_run
    /// use messaging::FeedPublisher;
    ///
    /// let publisher = FeedPublisher::new("localhost:9092", "orders".to_string())
    ///     .expect("Failed to create publisher");
    /// ```
    pub fn new(brokers: &str, topic: String) -> Result<Self, PublisherError> {
        debug!("Creating Kafka producer for brokers: {}", brokers);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()
            .map_err(|e| PublisherError::ProducerCreation(e.to_string()))?;

        Ok(Self { producer, topic })
    }

    /// Publish bytes as-is, without checking that they are valid JSON
    pub async fn publish_raw(&self, key: &str, payload: &[u8]) -> Result<(), PublisherError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
        {
            Ok((partition, offset)) => {
                debug!(
                    "Published to topic '{}', partition {}, offset {}",
                    self.topic, partition, offset
                );
                Ok(())
            }
            Err((err, _)) => {
                warn!("Failed to publish message: {}", err);
                Err(PublisherError::PublishFailed(err.to_string()))
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_creation_with_invalid_brokers() {
        // This should succeed (creation doesn't validate connection)
        let result = FeedPublisher::new("", "orders".to_string());
        assert!(result.is_ok());
    }

    #[test]
    fn test_publisher_reports_its_topic() {
        let publisher = FeedPublisher::new("localhost:9092", "orders-v2".to_string()).unwrap();
        assert_eq!(publisher.topic(), "orders-v2");
    }
}
