pub mod consumer;
pub mod producer;

pub use consumer::{ConsumerError, FeedConsumer, FeedMessage};
pub use producer::{FeedPublisher, PublisherError};
