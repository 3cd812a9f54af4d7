//! OpenTelemetry tracer setup.
//!
//! Every process gets an SDK tracer provider, so `tracing` spans carry real
//! trace and span ids that [`crate::OtelPropagator`] can put on the wire.
//! With `otlp_endpoint` set, spans are also exported over OTLP.

use crate::{TelemetryConfig, TelemetryError};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{self, RandomIdGenerator, Sampler, Tracer, TracerProvider},
    Resource,
};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

fn trace_config(config: &TelemetryConfig) -> trace::Config {
    trace::Config::default()
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(Resource::new(vec![
            KeyValue::new("service.name", config.service_name.clone()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]))
}

/// Build the tracer provider for `config`.
///
/// Exporting requires a running Tokio runtime.
pub fn build_tracer_provider(config: &TelemetryConfig) -> Result<TracerProvider, TelemetryError> {
    let Some(endpoint) = &config.otlp_endpoint else {
        return Ok(TracerProvider::builder()
            .with_config(trace_config(config))
            .build());
    };

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(trace_config(config))
        .install_batch(runtime::Tokio)
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))
}

/// `tracing` layer recording spans into `provider`.
pub fn trace_layer<S>(provider: &TracerProvider, service_name: &str) -> OpenTelemetryLayer<S, Tracer>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()))
}
