//! # Realworld Service Runtime
//!
//! Hosts the users and auth services and serves their operations over the
//! events transport. Set `RW_BROKER_URL` to a Redis server to split the
//! services across processes; otherwise an in-process broker is used.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialise telemetry
//! 3. Load the service directory
//! 4. Connect the response listener and one responder per hosted service
//! 5. Optionally round-trip a request to a hosted service
//! 6. Run until Ctrl+C or a consumer loop stops

use anyhow::{Context, Result};
use rw_dispatch::ServiceDirectory;
use rw_runtime::{RuntimeConfig, ServiceRuntime};
use rw_telemetry::init_telemetry;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env();
    let _telemetry = init_telemetry(config.telemetry.clone())?;

    info!(
        directory = %config.directory_path.display(),
        services = ?config.services,
        networked_broker = config.broker_url.is_some(),
        "Starting service runtime"
    );

    let directory = ServiceDirectory::load(&config.directory_path).with_context(|| {
        format!(
            "Failed to load service directory from {}",
            config.directory_path.display()
        )
    })?;

    let mut runtime = ServiceRuntime::start(&config, directory).await?;

    if config.self_check {
        if let Err(e) = runtime.self_check().await {
            runtime.shutdown().await;
            return Err(e);
        }
    }

    info!("Runtime is running. Press Ctrl+C to stop.");

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Shutdown signal received");
            Ok(())
        }
        (name, result) = runtime.wait_for_failure() => {
            match result {
                Ok(()) => {
                    error!(consumer = %name, "Consumer loop exited unexpectedly");
                    Err(anyhow::anyhow!("consumer {name} exited"))
                }
                Err(e) => {
                    error!(consumer = %name, error = %e, "Consumer loop failed");
                    Err(e.context(format!("consumer {name} failed")))
                }
            }
        }
    };

    runtime.shutdown().await;
    outcome
}
