use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::DomainError;

/// Order aggregate: the order row together with the delivery, payment and
/// items it exclusively owns. Persisted and cached as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Order {
    #[serde(rename = "order_uid")]
    #[validate(length(min = 1, message = "Order uid cannot be empty"))]
    pub uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

/// Delivery details, 1:1 with the owning order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Payment details, 1:1 with the owning order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i32,
    /// Unix timestamp, seconds
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i32,
    pub goods_total: i32,
    pub custom_fee: i32,
}

/// Order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i32,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i32,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

/// Sub-second digits kept by a `TIMESTAMPTZ` column
pub const STORED_SUBSEC_DIGITS: u16 = 6;

impl Order {
    /// Decode a feed payload and check it before it is handed to the store.
    pub fn from_json(payload: &[u8]) -> Result<Self, DomainError> {
        let order: Order = serde_json::from_slice(payload)?;
        order.ensure_valid()?;
        Ok(order.with_stored_precision())
    }

    /// Truncate `date_created` to microseconds, the precision the store keeps.
    ///
    /// The cache must hold exactly what a later restore reads back.
    pub fn with_stored_precision(mut self) -> Self {
        self.date_created = self.date_created.trunc_subsecs(STORED_SUBSEC_DIGITS);
        self
    }

    pub fn ensure_valid(&self) -> Result<(), DomainError> {
        self.validate()?;
        Ok(())
    }
}
