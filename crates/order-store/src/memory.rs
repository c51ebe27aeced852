//! In-memory stand-in for the four order tables.
//!
//! Mirrors the transactional contract of [`PostgresOrderStore`](crate::PostgresOrderStore):
//! an insert stages every row and applies them only if all four table writes
//! succeed. A failure can be injected at any table to exercise the rollback
//! path, and the store can be closed to exercise connection failures.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use domain::{Delivery, Order, Payment};

use crate::{OrderStore, OwnedItem, Snapshot, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Orders,
    Deliveries,
    Payments,
    Items,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Table::Orders => "orders",
            Table::Deliveries => "deliveries",
            Table::Payments => "payments",
            Table::Items => "items",
        };
        f.write_str(name)
    }
}

#[derive(Default)]
struct Tables {
    /// Order rows; `items` is always empty here
    orders: HashMap<String, Order>,
    deliveries: HashMap<String, Delivery>,
    payments: HashMap<String, Payment>,
    items: Vec<OwnedItem>,
    fail_on: Option<Table>,
    closed: bool,
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    tables: Mutex<Tables>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write rows directly, bypassing the insert path (rows "already in the database")
    pub fn seed(&self, order: &Order) {
        let mut tables = self.lock();
        tables.orders.insert(order.uid.clone(), shell(order));
        tables
            .deliveries
            .insert(order.uid.clone(), order.delivery.clone());
        tables
            .payments
            .insert(order.uid.clone(), order.payment.clone());
        tables.items.extend(order.items.iter().map(|item| OwnedItem {
            order_uid: order.uid.clone(),
            item: item.clone(),
        }));
    }

    /// Append a bare item row, whether or not its order exists
    pub fn seed_item(&self, item: OwnedItem) {
        self.lock().items.push(item);
    }

    /// Make every subsequent insert fail when it reaches `table`
    pub fn fail_on(&self, table: Table) {
        self.lock().fail_on = Some(table);
    }

    pub fn clear_failure(&self) {
        self.lock().fail_on = None;
    }

    /// Number of rows in `table` owned by `uid`
    pub fn row_count(&self, table: Table, uid: &str) -> usize {
        let tables = self.lock();
        match table {
            Table::Orders => usize::from(tables.orders.contains_key(uid)),
            Table::Deliveries => usize::from(tables.deliveries.contains_key(uid)),
            Table::Payments => usize::from(tables.payments.contains_key(uid)),
            Table::Items => tables.items.iter().filter(|i| i.order_uid == uid).count(),
        }
    }

    /// Calls to `get_order` and `restore_all` so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Calls to `insert_order` so far, successful or not
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panicking test thread must not take the other assertions down with it.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        let tables = self.lock();
        if tables.closed {
            return Err(StoreError::Connection(sqlx::Error::PoolClosed));
        }
        Ok(tables)
    }
}

fn shell(order: &Order) -> Order {
    Order {
        items: Vec::new(),
        ..order.clone()
    }
}

fn injected(table: Table) -> StoreError {
    StoreError::Database(sqlx::Error::Protocol(format!(
        "injected failure on insert into {table}"
    )))
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn restore_all(&self) -> Result<Snapshot, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let tables = self.open()?;

        let mut orders = Vec::new();
        for (uid, order) in &tables.orders {
            // Inner join: an order row without both children is not returned.
            let (Some(delivery), Some(payment)) =
                (tables.deliveries.get(uid), tables.payments.get(uid))
            else {
                continue;
            };
            orders.push(Order {
                delivery: delivery.clone(),
                payment: payment.clone(),
                ..order.clone()
            });
        }

        Ok(Snapshot {
            orders,
            items: tables.items.clone(),
        })
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.open()?;

        // Stage in statement order; nothing is applied until every step passed.
        if tables.orders.contains_key(&order.uid) {
            return Err(StoreError::DuplicateKey(order.uid.clone()));
        }
        for table in [Table::Orders, Table::Deliveries, Table::Payments] {
            if tables.fail_on == Some(table) {
                return Err(injected(table));
            }
        }
        if tables.fail_on == Some(Table::Items) && !order.items.is_empty() {
            return Err(injected(Table::Items));
        }

        tables.orders.insert(order.uid.clone(), shell(order));
        tables
            .deliveries
            .insert(order.uid.clone(), order.delivery.clone());
        tables
            .payments
            .insert(order.uid.clone(), order.payment.clone());
        tables.items.extend(order.items.iter().map(|item| OwnedItem {
            order_uid: order.uid.clone(),
            item: item.clone(),
        }));

        Ok(())
    }

    async fn get_order(&self, uid: &str) -> Result<Option<Order>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let tables = self.open()?;

        let (Some(order), Some(delivery), Some(payment)) = (
            tables.orders.get(uid),
            tables.deliveries.get(uid),
            tables.payments.get(uid),
        ) else {
            return Ok(None);
        };

        Ok(Some(Order {
            delivery: delivery.clone(),
            payment: payment.clone(),
            items: tables
                .items
                .iter()
                .filter(|i| i.order_uid == uid)
                .map(|i| i.item.clone())
                .collect(),
            ..order.clone()
        }))
    }

    async fn close(&self) {
        self.lock().closed = true;
    }
}
