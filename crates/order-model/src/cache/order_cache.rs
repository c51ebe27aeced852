use std::collections::HashMap;
use std::sync::Arc;

use domain::Order;
use tokio::sync::RwLock;
use tracing::debug;

/// In-process cache of order aggregates keyed by uid.
///
/// Every read and write takes the lock. Entries are never removed or
/// replaced: once a uid is present, its `Arc<Order>` stays the same for the
/// life of the cache.
#[derive(Default)]
pub struct OrderCache {
    entries: RwLock<HashMap<String, Arc<Order>>>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from restored entries
    pub fn from_entries(entries: HashMap<String, Arc<Order>>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Get cached order
    pub async fn get(&self, uid: &str) -> Option<Arc<Order>> {
        let entries = self.entries.read().await;
        match entries.get(uid) {
            Some(order) => {
                debug!("Cache hit for order: {}", uid);
                Some(Arc::clone(order))
            }
            None => {
                debug!("Cache miss for order: {}", uid);
                None
            }
        }
    }

    pub async fn contains(&self, uid: &str) -> bool {
        self.entries.read().await.contains_key(uid)
    }

    /// Insert `order` unless its uid is already cached.
    ///
    /// Returns the resident entry, which is the existing one when another
    /// writer got there first.
    pub async fn insert_if_absent(&self, order: Order) -> Arc<Order> {
        let mut entries = self.entries.write().await;
        let uid = order.uid.clone();
        let resident = entries.entry(uid).or_insert_with(|| Arc::new(order));
        debug!("Cached order: {}", resident.uid);
        Arc::clone(resident)
    }

    /// Snapshot of all cached uids, sorted ascending
    pub async fn uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = self.entries.read().await.keys().cloned().collect();
        uids.sort_unstable();
        uids
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{Delivery, Payment};

    fn order(uid: &str, customer_id: &str) -> Order {
        Order {
            uid: uid.to_string(),
            track_number: "TRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: Payment {
                transaction: uid.to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1637907727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: customer_id.to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: Utc::now(),
            oof_shard: "1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let cache = OrderCache::new();

        let first = cache.insert_if_absent(order("a1", "first")).await;
        let second = cache.insert_if_absent(order("a1", "second")).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.customer_id, "first");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_uids_are_sorted() {
        let cache = OrderCache::new();
        for uid in ["c3", "a1", "b2"] {
            cache.insert_if_absent(order(uid, "test")).await;
        }

        assert_eq!(cache.uids().await, vec!["a1", "b2", "c3"]);
    }

    #[tokio::test]
    async fn test_get_miss() {
        let cache = OrderCache::new();

        assert!(cache.get("missing").await.is_none());
        assert!(!cache.contains("missing").await);
        assert!(cache.is_empty().await);
    }
}
