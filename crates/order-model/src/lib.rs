pub mod cache;
pub mod model;
pub mod restore;

pub use cache::OrderCache;
pub use model::{CachedOrderModel, OrderModel};

use order_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderModelError {
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Order already exists: {0}")]
    DuplicateKey(String),

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<StoreError> for OrderModelError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connection(e) => OrderModelError::Connection(e),
            StoreError::DuplicateKey(uid) => OrderModelError::DuplicateKey(uid),
            StoreError::Integrity(msg) => OrderModelError::Integrity(msg),
            StoreError::Database(e) => OrderModelError::Database(e),
        }
    }
}

impl From<sqlx::Error> for OrderModelError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::from(err).into()
    }
}
