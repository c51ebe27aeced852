use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, Encoder,
    HistogramVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Ingestion metrics
    pub static ref INGEST_COUNTER: CounterVec = register_counter_vec!(
        "orders_ingested_total",
        "Total number of feed messages processed, by outcome",
        &["outcome"]
    )
    .expect("metric cannot be created");

    // Query metrics
    pub static ref QUERY_COUNTER: CounterVec = register_counter_vec!(
        "orders_queries_total",
        "Total number of order queries processed",
        &["query_type", "status"]
    )
    .expect("metric cannot be created");

    pub static ref QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "orders_query_duration_seconds",
        "Order query duration in seconds",
        &["query_type"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("metric cannot be created");

    // Cache metrics
    pub static ref CACHE_REQUESTS: CounterVec = register_counter_vec!(
        "orders_cache_requests_total",
        "Total number of order cache lookups",
        &["status"]
    )
    .expect("metric cannot be created");

    pub static ref CACHED_ORDERS: IntGauge = register_int_gauge!(
        "orders_cached",
        "Number of orders resident in the cache"
    )
    .expect("metric cannot be created");
}

/// Outcome of handling one feed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    Duplicate,
    Invalid,
    Failed,
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Inserted => "inserted",
            IngestOutcome::Duplicate => "duplicate",
            IngestOutcome::Invalid => "invalid",
            IngestOutcome::Failed => "failed",
        }
    }
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Helper function to record one ingested feed message
pub fn record_ingest(outcome: IngestOutcome) {
    INGEST_COUNTER.with_label_values(&[outcome.as_str()]).inc();
}

/// Helper function to record query execution
pub fn record_query(query_type: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    QUERY_COUNTER
        .with_label_values(&[query_type, status])
        .inc();
    QUERY_DURATION
        .with_label_values(&[query_type])
        .observe(duration_secs);
}

/// Helper function to record cache hit/miss
pub fn record_cache_request(hit: bool) {
    let status = if hit { "hit" } else { "miss" };
    CACHE_REQUESTS.with_label_values(&[status]).inc();
}

pub fn set_cached_orders(count: usize) {
    CACHED_ORDERS.set(count as i64);
}
