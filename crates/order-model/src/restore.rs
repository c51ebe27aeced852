//! Bootstrap restore: rebuilds the full cache from the store before the
//! model accepts any traffic.
//!
//! The snapshot is stitched in two passes. Pass one creates a shell entry for
//! every order row; pass two appends each item to its owner's shell. Pass two
//! only starts once pass one is complete, and an item whose owner has no
//! shell is reported as an integrity error instead of being dropped.

use std::collections::HashMap;
use std::sync::Arc;

use domain::Order;
use order_store::{OrderStore, Snapshot};
use tracing::{error, info};

use crate::cache::OrderCache;
use crate::OrderModelError;

/// Read the whole store and build the cache from it
pub async fn restore_cache<S>(store: &S) -> Result<OrderCache, OrderModelError>
where
    S: OrderStore + ?Sized,
{
    info!("Restoring order cache from the store...");

    let snapshot = store.restore_all().await.map_err(|e| {
        error!("Failed to read the store during restore: {}", e);
        OrderModelError::from(e)
    })?;
    let entries = restore_entries(snapshot)?;

    info!("Order cache restored with {} orders", entries.len());
    Ok(OrderCache::from_entries(entries))
}

/// Stitch a snapshot into cache entries
pub fn restore_entries(snapshot: Snapshot) -> Result<HashMap<String, Arc<Order>>, OrderModelError> {
    let Snapshot { orders, items } = snapshot;

    // Pass 1: shells
    let mut shells: HashMap<String, Order> = HashMap::with_capacity(orders.len());
    for mut order in orders {
        order.items.clear();
        let uid = order.uid.clone();
        if shells.insert(uid.clone(), order).is_some() {
            error!("Store returned order {} more than once", uid);
            return Err(OrderModelError::Integrity(format!(
                "order {uid} appears more than once in the store"
            )));
        }
    }

    // Pass 2: items
    let item_count = items.len();
    for owned in items {
        let Some(order) = shells.get_mut(&owned.order_uid) else {
            error!("Item references unknown order {}", owned.order_uid);
            return Err(OrderModelError::Integrity(format!(
                "item references unknown order {}",
                owned.order_uid
            )));
        };
        order.items.push(owned.item);
    }

    info!(
        "Stitched {} orders with {} items",
        shells.len(),
        item_count
    );

    Ok(shells
        .into_iter()
        .map(|(uid, order)| (uid, Arc::new(order)))
        .collect())
}
