//! # Envelope Publisher
//!
//! Serializes envelopes, stamps them with the active trace context and
//! writes them to a topic. Publishing is fire-and-forget: a successful
//! return only means the broker accepted the message.

use crate::broker::{Broker, BrokerMessage, BusError};
use crate::envelope::Envelope;
use async_trait::async_trait;
use rw_telemetry::TracePropagator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Trait for publishing envelopes to a topic.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `envelope` to `topic`.
    ///
    /// # Returns
    ///
    /// The number of subscribers the broker delivered to, where known.
    async fn publish(&self, topic: &str, envelope: Envelope) -> Result<usize, BusError>;

    /// Total envelopes published.
    fn events_published(&self) -> u64;
}

/// Publishes envelopes through a [`Broker`].
pub struct EnvelopePublisher {
    broker: Arc<dyn Broker>,
    propagator: Arc<dyn TracePropagator>,
    events_published: AtomicU64,
}

impl EnvelopePublisher {
    pub fn new(broker: Arc<dyn Broker>, propagator: Arc<dyn TracePropagator>) -> Self {
        Self {
            broker,
            propagator,
            events_published: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl EventPublisher for EnvelopePublisher {
    async fn publish(&self, topic: &str, mut envelope: Envelope) -> Result<usize, BusError> {
        if envelope.trace_context.is_empty() {
            envelope.trace_context = self.propagator.inject();
        }

        let message = BrokerMessage {
            key: envelope.key.clone(),
            value: envelope.to_bytes()?,
        };
        let receivers = self.broker.publish(topic, message).await?;
        self.events_published.fetch_add(1, Ordering::Relaxed);

        debug!(
            topic,
            key = %envelope.key,
            correlation_id = %envelope.correlation_id,
            receivers,
            "Envelope published"
        );
        Ok(receivers)
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
