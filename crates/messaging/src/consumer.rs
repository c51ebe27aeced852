use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Message at partition {partition}, offset {offset} has no payload")]
    NoPayload { partition: i32, offset: i64 },
}

/// Raw message taken off the feed
#[derive(Debug, Clone)]
pub struct FeedMessage {
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// Kafka consumer for the order feed
pub struct FeedConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl FeedConsumer {
    /// Create a consumer subscribed to `topic`.
    ///
    /// Creation does not contact the brokers; connection problems surface on
    /// the first `recv`.
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, ConsumerError> {
        info!(
            "Creating Kafka consumer with group_id: {}, topic: {}",
            group_id, topic
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", group_id)
            .set("bootstrap.servers", brokers)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "10000")
            .create()?;

        consumer.subscribe(&[topic])?;

        info!("Kafka consumer subscribed to {}", topic);
        Ok(Self {
            consumer,
            topic: topic.to_string(),
        })
    }

    /// Wait for the next message
    pub async fn recv(&self) -> Result<FeedMessage, ConsumerError> {
        let message = self.consumer.recv().await?;
        let (partition, offset) = (message.partition(), message.offset());

        debug!(
            "Received message from topic: {}, partition: {}, offset: {}",
            message.topic(),
            partition,
            offset
        );

        match message.payload() {
            Some(payload) => Ok(FeedMessage {
                partition,
                offset,
                payload: payload.to_vec(),
            }),
            None => {
                warn!("Message at offset {} has no payload", offset);
                Err(ConsumerError::NoPayload { partition, offset })
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Leave the consumer group
    pub fn unsubscribe(&self) {
        info!("Unsubscribing from {}", self.topic);
        self.consumer.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_consumer_creation_invalid_broker() {
        let result = FeedConsumer::new("invalid:9092", "test-group", "orders");
        // Should succeed in creation (connection happens on recv)
        assert!(result.is_ok());
        assert_eq!(result.unwrap().topic(), "orders");
    }
}
