use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_JAEGER_AGENT: &str = "localhost:6831";

/// How a binary reports logs and traces
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Jaeger agent address; traces are exported only when set
    pub jaeger_agent: Option<String>,
}

impl TelemetryConfig {
    /// Config for `service_name`. `ENABLE_JAEGER=true` turns on trace export
    /// to `JAEGER_ENDPOINT`, or the local agent when that is unset.
    pub fn for_service(service_name: &str, log_level: &str) -> Self {
        Self::from_lookup(service_name, log_level, |key| std::env::var(key).ok())
    }

    fn from_lookup<F>(service_name: &str, log_level: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("ENABLE_JAEGER").is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let jaeger_agent = enabled.then(|| {
            lookup("JAEGER_ENDPOINT").unwrap_or_else(|| DEFAULT_JAEGER_AGENT.to_string())
        });

        Self {
            service_name: service_name.to_string(),
            log_level: log_level.to_string(),
            jaeger_agent,
        }
    }
}

/// Install the global subscriber: env filter, JSON log lines, and the
/// OpenTelemetry layer when a Jaeger agent is configured.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), Box<dyn std::error::Error>> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .json();

    let otel_layer = match &config.jaeger_agent {
        Some(agent) => {
            let tracer = opentelemetry_jaeger::new_agent_pipeline()
                .with_service_name(&config.service_name)
                .with_endpoint(agent)
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::info!(
        service = %config.service_name,
        jaeger = config.jaeger_agent.as_deref().unwrap_or("disabled"),
        "Telemetry initialized"
    );
    Ok(())
}

/// Flush and stop trace export
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
