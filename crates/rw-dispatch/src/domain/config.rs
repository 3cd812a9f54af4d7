//! Dispatch configuration.

use crate::domain::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Timeouts and topics of the dispatch bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// How long an events call waits for its correlated response.
    pub events_timeout: Duration,
    /// Deadline of an RPC call.
    pub rpc_timeout: Duration,
    /// Deadline of a REST call.
    pub rest_timeout: Duration,
    /// Topic every responder publishes its responses to.
    pub results_topic: String,
    /// Consecutive broker read errors before a consumer gives up.
    pub max_consecutive_read_errors: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            events_timeout: Duration::from_secs(3),
            rpc_timeout: Duration::from_secs(5),
            rest_timeout: Duration::from_secs(10),
            results_topic: "results".to_string(),
            max_consecutive_read_errors: shared_bus::DEFAULT_MAX_CONSECUTIVE_READ_ERRORS,
        }
    }
}

impl DispatchConfig {
    /// Defaults overridden by `RW_*` environment variables.
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let millis = |name: &str| -> Option<Duration> {
            let raw = lookup(name)?;
            match raw.trim().parse::<u64>() {
                Ok(ms) => Some(Duration::from_millis(ms)),
                Err(_) => {
                    warn!(var = name, value = %raw, "Ignoring non-numeric timeout");
                    None
                }
            }
        };

        if let Some(timeout) = millis("RW_EVENTS_TIMEOUT_MS") {
            config.events_timeout = timeout;
        }
        if let Some(timeout) = millis("RW_RPC_TIMEOUT_MS") {
            config.rpc_timeout = timeout;
        }
        if let Some(timeout) = millis("RW_REST_TIMEOUT_MS") {
            config.rest_timeout = timeout;
        }
        if let Some(topic) = lookup("RW_RESULTS_TOPIC") {
            config.results_topic = topic;
        }
        if let Some(raw) = lookup("RW_MAX_READ_ERRORS") {
            match raw.trim().parse() {
                Ok(max) => config.max_consecutive_read_errors = max,
                Err(_) => warn!(value = %raw, "Ignoring invalid RW_MAX_READ_ERRORS"),
            }
        }

        config
    }

    /// Reject configurations the bridge cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, timeout) in [
            ("events_timeout", self.events_timeout),
            ("rpc_timeout", self.rpc_timeout),
            ("rest_timeout", self.rest_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.results_topic.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "results_topic",
            });
        }
        if self.max_consecutive_read_errors == 0 {
            return Err(ConfigError::Zero {
                field: "max_consecutive_read_errors",
            });
        }
        Ok(())
    }
}
