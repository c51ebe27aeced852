pub mod postgres_order_store;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use postgres_order_store::PostgresOrderStore;

use async_trait::async_trait;
use domain::{Item, Order};
use thiserror::Error;

/// Item row together with the uid of the order that owns it
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedItem {
    pub order_uid: String,
    pub item: Item,
}

/// Full contents of the store, as read by a single restore transaction.
///
/// `orders` carry empty item sequences; `items` holds every item row in
/// insertion order. Stitching them together is left to the caller.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub orders: Vec<Order>,
    pub items: Vec<OwnedItem>,
}

/// Relational storage for order aggregates.
///
/// Each call runs in exactly one transaction. There is deliberately no
/// per-table write: an order is persisted whole or not at all.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Read every order with its delivery and payment, plus the full items table
    async fn restore_all(&self) -> Result<Snapshot, StoreError>;

    /// Persist the order, its delivery, its payment and all of its items atomically
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Load one aggregate; `None` when no order row exists for `uid`
    async fn get_order(&self, uid: &str) -> Result<Option<Order>, StoreError>;

    /// Release the underlying connections. Calling it again is a no-op.
    async fn close(&self);
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Connection(err),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_) => StoreError::Integrity(err.to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                StoreError::DuplicateKey(db.message().to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_connection_errors() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolClosed),
            StoreError::Connection(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Connection(_)
        ));
    }

    #[test]
    fn test_decode_errors_are_integrity_errors() {
        let err = sqlx::Error::ColumnNotFound("sm_id".to_string());
        match StoreError::from(err) {
            StoreError::Integrity(msg) => assert!(msg.contains("sm_id")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_other_errors_are_database_errors() {
        let err = sqlx::Error::Protocol("unexpected message".to_string());
        assert!(matches!(StoreError::from(err), StoreError::Database(_)));
    }
}
