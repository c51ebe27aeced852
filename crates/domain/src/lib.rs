pub mod aggregates;
pub mod errors;

pub use aggregates::order::{Delivery, Item, Order, Payment};
pub use errors::DomainError;
