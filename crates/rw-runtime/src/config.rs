//! Runtime configuration.

use rw_dispatch::DispatchConfig;
use rw_telemetry::TelemetryConfig;
use shared_types::{ServiceName, Transport};
use std::path::PathBuf;
use tracing::warn;

/// Everything the service process needs to start.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// TOML service directory.
    pub directory_path: PathBuf,
    /// Services whose responders run in this process.
    pub services: Vec<ServiceName>,
    /// Transport auth uses to reach the users service.
    pub internal_transport: Transport,
    /// Redis broker URL. Unset means an in-process broker, which only
    /// connects services hosted by the same process.
    pub broker_url: Option<String>,
    /// Round-trip a request through the broker after startup.
    pub self_check: bool,
    pub dispatch: DispatchConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            directory_path: PathBuf::from("configs/services.toml"),
            services: vec![ServiceName::Users, ServiceName::Auth],
            internal_transport: Transport::Events,
            broker_url: None,
            self_check: true,
            dispatch: DispatchConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `RW_DIRECTORY_PATH` | `configs/services.toml` |
    /// | `RW_SERVICES` | `users,auth` |
    /// | `RW_INTERNAL_TRANSPORT` | `events` |
    /// | `RW_BROKER_URL` | unset (in-process broker) |
    /// | `RW_SELF_CHECK` | `true` |
    ///
    /// plus the `RW_*` variables of [`DispatchConfig`] and [`TelemetryConfig`].
    pub fn from_env() -> Self {
        let mut config = Self {
            dispatch: DispatchConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
            ..Self::default()
        };

        if let Ok(path) = std::env::var("RW_DIRECTORY_PATH") {
            config.directory_path = PathBuf::from(path);
        }
        if let Ok(raw) = std::env::var("RW_SERVICES") {
            config.services = parse_services(&raw);
        }
        if let Ok(raw) = std::env::var("RW_INTERNAL_TRANSPORT") {
            match raw.parse() {
                Ok(transport) => config.internal_transport = transport,
                Err(e) => warn!(error = %e, "Ignoring RW_INTERNAL_TRANSPORT"),
            }
        }
        config.broker_url = std::env::var("RW_BROKER_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        if let Ok(raw) = std::env::var("RW_SELF_CHECK") {
            config.self_check = !matches!(raw.trim(), "0" | "false" | "no" | "off");
        }

        config
    }
}

/// Parse a comma separated service list, skipping unknown names.
fn parse_services(raw: &str) -> Vec<ServiceName> {
    let mut services = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.parse::<ServiceName>() {
            Ok(service) if !services.contains(&service) => services.push(service),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Ignoring unknown service in RW_SERVICES"),
        }
    }
    services
}

impl RuntimeConfig {
    /// Whether users and auth both run in this process, so an in-process
    /// broker can serve every call between them.
    pub fn hosts_all(&self) -> bool {
        [ServiceName::Users, ServiceName::Auth]
            .iter()
            .all(|service| self.services.contains(service))
    }
}
