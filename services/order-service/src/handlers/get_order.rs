use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use common::metrics;
use domain::Order;
use order_model::OrderModelError;
use std::time::Instant;
use tracing::{error, info};

use crate::state::AppState;

/// Get a single order by uid
pub async fn get_order_handler(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<Order>, (StatusCode, String)> {
    info!("Fetching order: {}", uid);
    let start = Instant::now();

    let result = state.model.get_by_uid(&uid).await;
    metrics::record_query("get_order", result.is_ok(), start.elapsed().as_secs_f64());

    match result {
        Ok(order) => {
            info!("Successfully retrieved order: {}", uid);
            Ok(Json(Order::clone(&order)))
        }
        Err(OrderModelError::NotFound(_)) => {
            info!("Order not found: {}", uid);
            Err((StatusCode::BAD_REQUEST, format!("Order not found: {}", uid)))
        }
        Err(e) => {
            error!("Failed to fetch order {}: {}", uid, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to fetch order: {}", e),
            ))
        }
    }
}
