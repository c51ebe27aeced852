use super::{OrderStore, OwnedItem, Snapshot, StoreError};
use async_trait::async_trait;
use domain::{Delivery, Item, Order, Payment};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, error, info};

const SELECT_ORDERS: &str = r#"
    SELECT
        o.order_uid, o.track_number, o.entry, o.locale,
        o.internal_signature, o.customer_id, o.delivery_service,
        o.shardkey, o.sm_id, o.date_created, o.oof_shard,
        d.name, d.phone, d.zip, d.city, d.address, d.region, d.email,
        p.transaction, p.request_id, p.currency, p.provider, p.amount,
        p.payment_dt, p.bank, p.delivery_cost, p.goods_total, p.custom_fee
    FROM orders AS o
    INNER JOIN deliveries AS d ON d.order_uid = o.order_uid
    INNER JOIN payments AS p ON p.order_uid = o.order_uid
"#;

const ITEM_COLUMNS: &str = r#"
    order_uid, chrt_id, track_number, price, rid, name,
    sale, size, total_price, nm_id, brand, status
"#;

/// PostgreSQL implementation of the order store
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool (useful for testing)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn persist(&self, order: &Order) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        insert_order_row(&mut *tx, order).await?;
        insert_delivery(&mut *tx, &order.uid, &order.delivery).await?;
        insert_payment(&mut *tx, &order.uid, &order.payment).await?;
        for item in &order.items {
            insert_item(&mut *tx, &order.uid, item).await?;
        }

        // An early return above drops `tx`, which rolls everything back.
        tx.commit().await
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn restore_all(&self) -> Result<Snapshot, StoreError> {
        let mut tx = self.pool.begin().await?;
        // Both SELECTs read one snapshot.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let order_rows = sqlx::query(SELECT_ORDERS).fetch_all(&mut *tx).await?;
        let orders = order_rows
            .iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let item_rows = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY id"))
            .fetch_all(&mut *tx)
            .await?;
        let items = item_rows
            .iter()
            .map(|row| -> Result<OwnedItem, sqlx::Error> {
                Ok(OwnedItem {
                    order_uid: row.try_get("order_uid")?,
                    item: item_from_row(row)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await?;

        info!(
            "Read {} orders and {} items from the store",
            orders.len(),
            items.len()
        );

        Ok(Snapshot { orders, items })
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        debug!(
            "Persisting order {} with {} items",
            order.uid,
            order.items.len()
        );

        match self.persist(order).await {
            Ok(()) => {
                info!("Persisted order {}", order.uid);
                Ok(())
            }
            Err(e) => {
                error!("Failed to persist order {}: {}", order.uid, e);
                match StoreError::from(e) {
                    StoreError::DuplicateKey(_) => Err(StoreError::DuplicateKey(order.uid.clone())),
                    other => Err(other),
                }
            }
        }
    }

    async fn get_order(&self, uid: &str) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("{SELECT_ORDERS} WHERE o.order_uid = $1"))
            .bind(uid)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            debug!("No order row for {}", uid);
            tx.commit().await?;
            return Ok(None);
        };
        let mut order = order_from_row(&row)?;

        let item_rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE order_uid = $1 ORDER BY id"
        ))
        .bind(uid)
        .fetch_all(&mut *tx)
        .await?;
        order.items = item_rows
            .iter()
            .map(item_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await?;

        debug!("Loaded order {} with {} items", uid, order.items.len());
        Ok(Some(order))
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            info!("Closing database pool");
            self.pool.close().await;
        }
    }
}

async fn insert_order_row(conn: &mut PgConnection, order: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            order_uid, track_number, entry, locale, internal_signature,
            customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(&order.uid)
    .bind(&order.track_number)
    .bind(&order.entry)
    .bind(&order.locale)
    .bind(&order.internal_signature)
    .bind(&order.customer_id)
    .bind(&order.delivery_service)
    .bind(&order.shardkey)
    .bind(order.sm_id)
    .bind(order.date_created)
    .bind(&order.oof_shard)
    .execute(conn)
    .await?;

    Ok(())
}

async fn insert_delivery(
    conn: &mut PgConnection,
    order_uid: &str,
    delivery: &Delivery,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(order_uid)
    .bind(&delivery.name)
    .bind(&delivery.phone)
    .bind(&delivery.zip)
    .bind(&delivery.city)
    .bind(&delivery.address)
    .bind(&delivery.region)
    .bind(&delivery.email)
    .execute(conn)
    .await?;

    Ok(())
}

async fn insert_payment(
    conn: &mut PgConnection,
    order_uid: &str,
    payment: &Payment,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            order_uid, transaction, request_id, currency, provider, amount,
            payment_dt, bank, delivery_cost, goods_total, custom_fee
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(order_uid)
    .bind(&payment.transaction)
    .bind(&payment.request_id)
    .bind(&payment.currency)
    .bind(&payment.provider)
    .bind(payment.amount)
    .bind(payment.payment_dt)
    .bind(&payment.bank)
    .bind(payment.delivery_cost)
    .bind(payment.goods_total)
    .bind(payment.custom_fee)
    .execute(conn)
    .await?;

    Ok(())
}

async fn insert_item(conn: &mut PgConnection, order_uid: &str, item: &Item) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO items (
            order_uid, chrt_id, track_number, price, rid, name,
            sale, size, total_price, nm_id, brand, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(order_uid)
    .bind(item.chrt_id)
    .bind(&item.track_number)
    .bind(item.price)
    .bind(&item.rid)
    .bind(&item.name)
    .bind(item.sale)
    .bind(&item.size)
    .bind(item.total_price)
    .bind(item.nm_id)
    .bind(&item.brand)
    .bind(item.status)
    .execute(conn)
    .await?;

    Ok(())
}

/// Decode one joined orders/deliveries/payments row. Items are left empty.
fn order_from_row(row: &PgRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        uid: row.try_get("order_uid")?,
        track_number: row.try_get("track_number")?,
        entry: row.try_get("entry")?,
        delivery: Delivery {
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            zip: row.try_get("zip")?,
            city: row.try_get("city")?,
            address: row.try_get("address")?,
            region: row.try_get("region")?,
            email: row.try_get("email")?,
        },
        payment: Payment {
            transaction: row.try_get("transaction")?,
            request_id: row.try_get("request_id")?,
            currency: row.try_get("currency")?,
            provider: row.try_get("provider")?,
            amount: row.try_get("amount")?,
            payment_dt: row.try_get("payment_dt")?,
            bank: row.try_get("bank")?,
            delivery_cost: row.try_get("delivery_cost")?,
            goods_total: row.try_get("goods_total")?,
            custom_fee: row.try_get("custom_fee")?,
        },
        items: Vec::new(),
        locale: row.try_get("locale")?,
        internal_signature: row.try_get("internal_signature")?,
        customer_id: row.try_get("customer_id")?,
        delivery_service: row.try_get("delivery_service")?,
        shardkey: row.try_get("shardkey")?,
        sm_id: row.try_get("sm_id")?,
        date_created: row.try_get("date_created")?,
        oof_shard: row.try_get("oof_shard")?,
    })
}

fn item_from_row(row: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        chrt_id: row.try_get("chrt_id")?,
        track_number: row.try_get("track_number")?,
        price: row.try_get("price")?,
        rid: row.try_get("rid")?,
        name: row.try_get("name")?,
        sale: row.try_get("sale")?,
        size: row.try_get("size")?,
        total_price: row.try_get("total_price")?,
        nm_id: row.try_get("nm_id")?,
        brand: row.try_get("brand")?,
        status: row.try_get("status")?,
    })
}
