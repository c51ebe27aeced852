use std::sync::Arc;

use async_trait::async_trait;
use common::config::DatabaseConfig;
use common::metrics;
use domain::Order;
use order_store::{OrderStore, PostgresOrderStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, error, info, warn};

use crate::cache::OrderCache;
use crate::restore::restore_cache;
use crate::OrderModelError;

/// The only way the rest of the service reaches orders
#[async_trait]
pub trait OrderModel: Send + Sync {
    /// Persist a new order and cache it. Fails with `DuplicateKey` if the uid is already known.
    async fn insert(&self, order: Order) -> Result<(), OrderModelError>;

    /// Cached order, or the stored one on a cache miss. Fails with `NotFound` if neither has it.
    async fn get_by_uid(&self, uid: &str) -> Result<Arc<Order>, OrderModelError>;

    /// Every known uid, sorted ascending
    async fn list_of_uids(&self) -> Vec<String>;

    /// Release the store. Safe to call more than once.
    async fn close(&self);
}

/// Write-through cache over an [`OrderStore`]
pub struct CachedOrderModel<S> {
    store: S,
    cache: OrderCache,
}

impl CachedOrderModel<PostgresOrderStore> {
    /// Connect to PostgreSQL and restore the cache.
    ///
    /// Returns only once every stored order is cached; a failed restore is
    /// returned as an error and no model is built.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, OrderModelError> {
        info!("Connecting to database at {}...", config.redacted_url());
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url())
            .await
            .map_err(|e| {
                error!("Failed to connect to database: {}", e);
                OrderModelError::from(e)
            })?;
        info!("Database connected");

        Self::with_store(PostgresOrderStore::new(pool)).await
    }
}

impl<S: OrderStore> CachedOrderModel<S> {
    /// Build the model over `store`, restoring the cache first
    pub async fn with_store(store: S) -> Result<Self, OrderModelError> {
        let cache = match restore_cache(&store).await {
            Ok(cache) => cache,
            Err(e) => {
                store.close().await;
                return Err(e);
            }
        };

        metrics::set_cached_orders(cache.len().await);
        Ok(Self { store, cache })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of cached orders
    pub async fn cached_count(&self) -> usize {
        self.cache.len().await
    }
}

#[async_trait]
impl<S: OrderStore> OrderModel for CachedOrderModel<S> {
    async fn insert(&self, order: Order) -> Result<(), OrderModelError> {
        let order = order.with_stored_precision();
        if self.cache.contains(&order.uid).await {
            info!("Order {} already exists, skipping store", order.uid);
            return Err(OrderModelError::DuplicateKey(order.uid));
        }

        if let Err(e) = self.store.insert_order(&order).await {
            warn!("Failed to insert order {}: {}", order.uid, e);
            return Err(e.into());
        }

        let cached = self.cache.insert_if_absent(order).await;
        metrics::set_cached_orders(self.cache.len().await);
        info!(
            "Order inserted: {} ({} items)",
            cached.uid,
            cached.items.len()
        );
        Ok(())
    }

    async fn get_by_uid(&self, uid: &str) -> Result<Arc<Order>, OrderModelError> {
        if let Some(order) = self.cache.get(uid).await {
            metrics::record_cache_request(true);
            return Ok(order);
        }
        metrics::record_cache_request(false);

        debug!("Order {} not cached, querying store", uid);
        match self.store.get_order(uid).await? {
            Some(order) => {
                info!("Loaded order {} from store", uid);
                let resident = self.cache.insert_if_absent(order).await;
                metrics::set_cached_orders(self.cache.len().await);
                Ok(resident)
            }
            None => {
                debug!("Order not found: {}", uid);
                Err(OrderModelError::NotFound(uid.to_string()))
            }
        }
    }

    async fn list_of_uids(&self) -> Vec<String> {
        self.cache.uids().await
    }

    async fn close(&self) {
        self.store.close().await;
    }
}
