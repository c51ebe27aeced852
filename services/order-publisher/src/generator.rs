//! Synthetic order feed: unique orders derived from a template, some of them
//! deliberately broken so the consumer's rejection path gets exercised.

use chrono::{TimeZone, Utc};
use domain::{Delivery, Item, Order, Payment};
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;

const NAMES: &[&str] = &[
    "Nikolay Popov",
    "Ivan Ivanov",
    "Sergey Petrov",
    "Dmitry Sidorov",
    "Alexander Smirnov",
];
const CITIES: &[&str] = &["Kiryat Mozkin", "Moscow", "New York", "Los Angeles", "London"];
const REGIONS: &[&str] = &[
    "Kraiot",
    "Moscow Region",
    "California",
    "New York",
    "Greater London",
];
const BRANDS: &[&str] = &["Vivienne Sabo", "Maybelline", "L'Oreal", "Max Factor", "Revlon"];

/// Top-level fields that a structural corruption may drop
pub const REMOVABLE_FIELDS: [&str; 4] = ["delivery", "payment", "items", "order_uid"];

pub const BREAK_STRUCTURE_PROBABILITY: f64 = 0.15;
pub const TRUNCATE_PROBABILITY: f64 = 0.20;

/// What, if anything, was done to a payload before publishing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    None,
    MissingField(&'static str),
    Truncated(usize),
}

#[derive(Debug, Clone)]
pub struct Payload {
    pub key: String,
    pub bytes: Vec<u8>,
    pub corruption: Corruption,
}

pub struct OrderGenerator<R> {
    rng: R,
    template: Order,
}

impl<R: Rng> OrderGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            template: template_order(),
        }
    }

    /// Number of messages for one run, 10 to 29
    pub fn batch_size(&mut self) -> usize {
        self.rng.gen_range(10..30)
    }

    /// A valid order with a fresh uid and randomised contents
    pub fn next_order(&mut self) -> Order {
        let mut order = self.template.clone();
        let uid = uuid::Uuid::new_v4().simple().to_string();

        order.delivery.name = self.pick(NAMES);
        order.delivery.phone = format!("+972{}", self.rng.gen_range(0..1_000_000_000));
        order.delivery.city = self.pick(CITIES);
        order.delivery.address = format!("Address_{}", self.random_string(10));
        order.delivery.region = self.pick(REGIONS);
        order.delivery.email = format!("{}@example.com", self.random_string(5));
        order.payment.transaction = uid.clone();
        order.payment.provider = format!("Provider_{}", self.random_string(4));
        order.payment.bank = format!("Bank_{}", self.random_string(6));

        let item_count = self.rng.gen_range(1..=5);
        let base = order.items[0].clone();
        order.items = (0..item_count)
            .map(|_| {
                let mut item = base.clone();
                item.chrt_id = self.rng.gen_range(0..1_000_000);
                item.track_number = self.random_string(10);
                item.price = self.rng.gen_range(0..1000);
                item.rid = self.random_string(15);
                item.name = format!("Item_{}", self.random_string(6));
                item.total_price = item.price * (100 - item.sale) / 100;
                item.nm_id = self.rng.gen_range(0..1_000_000);
                item.brand = self.pick(BRANDS);
                item.status = self.rng.gen_range(0..1000);
                item
            })
            .collect();

        order.uid = uid;
        order
    }

    /// Serialized next order, possibly corrupted
    pub fn next_payload(&mut self) -> Result<Payload, serde_json::Error> {
        let order = self.next_order();
        let key = order.uid.clone();
        let bytes = serde_json::to_vec(&order)?;

        let roll: f64 = self.rng.gen();
        let payload = if roll < BREAK_STRUCTURE_PROBABILITY {
            let field = REMOVABLE_FIELDS[self.rng.gen_range(0..REMOVABLE_FIELDS.len())];
            let mut value = serde_json::to_value(&order)?;
            if let Some(object) = value.as_object_mut() {
                object.remove(field);
            }
            Payload {
                key,
                bytes: serde_json::to_vec(&value)?,
                corruption: Corruption::MissingField(field),
            }
        } else if roll < BREAK_STRUCTURE_PROBABILITY + TRUNCATE_PROBABILITY {
            let cut = self.rng.gen_range(0..bytes.len());
            Payload {
                key,
                bytes: bytes[..cut].to_vec(),
                corruption: Corruption::Truncated(cut),
            }
        } else {
            Payload {
                key,
                bytes,
                corruption: Corruption::None,
            }
        };

        Ok(payload)
    }

    fn pick(&mut self, choices: &[&str]) -> String {
        choices
            .choose(&mut self.rng)
            .copied()
            .unwrap_or_default()
            .to_string()
    }

    fn random_string(&mut self, len: usize) -> String {
        (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }
}

fn template_order() -> Order {
    Order {
        uid: String::new(),
        track_number: "WBILMTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Nikolay Popov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "email@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: String::new(),
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
        items: vec![Item {
            chrt_id: 9934930,
            track_number: "WBILMTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0b".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2389212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: String::new(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: Utc
            .with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
            .single()
            .unwrap_or_default(),
        oof_shard: "1".to_string(),
    }
}
