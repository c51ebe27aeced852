pub mod order_cache;

pub use order_cache::OrderCache;
