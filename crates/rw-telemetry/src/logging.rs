//! Structured logging setup.
//!
//! Every crate logs through `tracing`; this module installs the global
//! subscriber once per process. JSON output carries the same fields as the
//! human-readable format (`correlation_id`, `service`, `operation`, ...).

use crate::tracing_setup::{build_tracer_provider, trace_layer};
use crate::{TelemetryConfig, TelemetryError};
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global `tracing` subscriber with the OpenTelemetry layer.
///
/// Returns the tracer provider backing the layer; shut it down on exit to
/// flush exported spans. Fails with [`TelemetryError::AlreadyInitialised`]
/// when a subscriber is already installed, e.g. by a test harness.
pub fn init_logging(config: &TelemetryConfig) -> Result<TracerProvider, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("invalid log filter: {e}")))?;

    let provider = build_tracer_provider(config)?;
    let otel_layer = trace_layer(&provider, &config.service_name);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(config.thread_ids);
    let (json_layer, plain_layer) = if config.json_logs {
        (Some(fmt_layer.json()), None)
    } else {
        (None, Some(fmt_layer))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(tracing_subscriber::Layer::and_then(json_layer, plain_layer))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialised(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        otlp_export = config.otlp_endpoint.is_some(),
        "Structured logging initialised"
    );
    Ok(provider)
}
