use crate::application::services::health_reducer::{CHECKS_COUNTER, OVERALL_COUNTER};
use crate::config::Config;
use metrics::Unit;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Used when `RUST_LOG` is unset. Probe outcomes log at debug under
/// `inbound_health::application`.
pub const DEFAULT_LOG_FILTER: &str = "inbound_health=info,tower_http=info,sqlx=warn,hickory_proto=warn";

/// Flushes pending spans on drop when OTLP export is on
pub struct ObservabilityGuard {
    otlp: bool,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if self.otlp {
            global::shutdown_tracer_provider();
        }
    }
}

pub fn init(config: &Config) -> Result<ObservabilityGuard, Box<dyn std::error::Error>> {
    let otlp = init_tracing(config)?;
    init_metrics(config)?;
    Ok(ObservabilityGuard { otlp })
}

/// Attributes attached to every exported span
pub fn service_resource(config: &Config) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("inbound.domain", config.inbound_domain.clone()),
        KeyValue::new("amazon.mock_mode", config.amazon_mock_mode),
    ])
}

/// Returns whether spans are exported over OTLP
fn init_tracing(config: &Config) -> Result<bool, Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let otel_layer = match &config.otel_exporter_endpoint {
        Some(endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(sdktrace::config().with_resource(service_resource(config)))
                .install_batch(runtime::Tokio)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };
    let otlp = otel_layer.is_some();

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    if let Some(endpoint) = &config.otel_exporter_endpoint {
        tracing::info!("Exporting spans for {} to {}", config.service_name, endpoint);
    }
    Ok(otlp)
}

fn init_metrics(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()?;
    describe_metrics();

    tracing::info!(
        "Serving {} and {} on :{}/metrics",
        CHECKS_COUNTER,
        OVERALL_COUNTER,
        config.metrics_port
    );
    Ok(())
}

/// Help text for the counters the health reducer emits
pub fn describe_metrics() {
    metrics::describe_counter!(
        CHECKS_COUNTER,
        Unit::Count,
        "Individual health check outcomes by check name and status"
    );
    metrics::describe_counter!(
        OVERALL_COUNTER,
        Unit::Count,
        "Connection health verdicts by status"
    );
}
