//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and trace propagation.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter directive (`info`, `rw_dispatch=debug`, ...)
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to include thread ids in log lines
    pub thread_ids: bool,

    /// OTLP collector endpoint. Spans are only exported when set; trace
    /// ids are generated and propagated either way.
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "realworld".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            thread_ids: true,
            otlp_endpoint: None,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RW_SERVICE_NAME`: Service name (default: realworld)
    /// - `RW_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `RW_JSON_LOGS`: JSON output (default: false locally, true in containers)
    /// - `RW_THREAD_IDS`: Include thread ids (default: true)
    /// - `RW_OTLP_ENDPOINT`: OTLP gRPC endpoint for span export (default: none)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("RW_SERVICE_NAME").unwrap_or_else(|_| "realworld".to_string()),

            log_level: env::var("RW_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("RW_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            thread_ids: env::var("RW_THREAD_IDS")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            otlp_endpoint: env::var("RW_OTLP_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }

    /// Configuration for a named service instance.
    pub fn for_service(service_name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = service_name.to_string();
        config
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
