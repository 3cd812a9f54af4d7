//! Wiring helpers: connect consumer loops and spawn them.
//!
//! Consumers subscribe before these functions return, so nothing published
//! afterwards can be missed.

use crate::domain::config::DispatchConfig;
use crate::domain::pending::CorrelationRegistry;
use crate::listener::ResponseCollector;
use crate::responder::Responder;
use shared_bus::{Broker, BusError, ConsumerLoop};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Handle of a spawned consumer loop.
pub type ConsumerTask = JoinHandle<Result<(), BusError>>;

/// Run a [`ResponseCollector`] for `registry` on the results topic.
pub async fn spawn_response_listener(
    broker: &dyn Broker,
    registry: CorrelationRegistry,
    config: &DispatchConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<ConsumerTask, BusError> {
    let consumer = ConsumerLoop::connect(broker, &config.results_topic)
        .await?
        .with_max_consecutive_errors(config.max_consecutive_read_errors);
    info!(topic = %config.results_topic, "Response listener connected");

    let collector = Arc::new(ResponseCollector::new(registry));
    Ok(tokio::spawn(consumer.run(collector, shutdown)))
}

/// Run `responder` on the request topic `topic`.
pub async fn spawn_responder(
    broker: &dyn Broker,
    topic: &str,
    responder: Responder,
    config: &DispatchConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<ConsumerTask, BusError> {
    let consumer = ConsumerLoop::connect(broker, topic)
        .await?
        .with_max_consecutive_errors(config.max_consecutive_read_errors);
    info!(topic, service = %responder.service(), "Responder connected");

    Ok(tokio::spawn(consumer.run(Arc::new(responder), shutdown)))
}
