use axum::{extract::State, Json};
use common::metrics;
use std::time::Instant;
use tracing::info;

use crate::state::AppState;

/// All known order uids, sorted ascending
pub async fn list_orders_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    let start = Instant::now();

    let uids = state.model.list_of_uids().await;

    metrics::record_query("list_orders", true, start.elapsed().as_secs_f64());
    info!("Listed {} orders", uids.len());
    Json(uids)
}
