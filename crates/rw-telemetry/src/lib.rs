//! # Realworld Telemetry
//!
//! Logging and trace propagation shared by every service.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rw_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::for_service("users"))?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RW_SERVICE_NAME` | `realworld` | Service name in logs |
//! | `RW_LOG_LEVEL` | `info` | Log filter directive (falls back to `RUST_LOG`) |
//! | `RW_JSON_LOGS` | `false` (`true` in containers) | JSON log output |
//! | `RW_THREAD_IDS` | `true` | Thread ids in log lines |
//! | `RW_OTLP_ENDPOINT` | unset | OTLP gRPC endpoint for span export |

mod config;
mod context;
mod logging;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use context::{
    NoopPropagator, OtelPropagator, PropagatedContext, TraceContext, TracePropagator,
};
pub use logging::init_logging;
pub use tracing_setup::{build_tracer_provider, trace_layer};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Logging already initialised: {0}")]
    AlreadyInitialised(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),
}

/// Initialize logging and tracing for a service process.
///
/// Returns a guard that should be held for the lifetime of the process.
/// With `otlp_endpoint` set this must run inside a Tokio runtime.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let provider = init_logging(&config)?;
    tracing::info!(service = %config.service_name, "Telemetry initialised");
    Ok(TelemetryGuard {
        service_name: config.service_name,
        provider,
    })
}

/// Guard that keeps telemetry active. Shuts down the tracer provider on drop.
pub struct TelemetryGuard {
    service_name: String,
    provider: opentelemetry_sdk::trace::TracerProvider,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
        if let Err(e) = self.provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {e:?}");
        }
    }
}
