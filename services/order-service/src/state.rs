use order_model::OrderModel;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn OrderModel>,
}

impl AppState {
    pub fn new(model: Arc<dyn OrderModel>) -> Self {
        Self { model }
    }
}
