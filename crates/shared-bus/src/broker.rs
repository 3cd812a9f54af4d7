//! # Broker
//!
//! Topic-based publish/subscribe. [`InMemoryBroker`] keeps one
//! `tokio::sync::broadcast` channel per topic and suits single-process
//! deployments and tests; [`crate::RedisBroker`] connects processes through
//! Redis Streams.

use crate::subscriber::{MessageStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors from broker operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("Subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("Cannot connect to broker: {reason}")]
    Connect { reason: String },

    #[error("Connection to '{topic}' lost: {reason}")]
    ConnectionLost { topic: String, reason: String },

    #[error(transparent)]
    Envelope(#[from] crate::envelope::EnvelopeError),
}

/// A raw message as the broker sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// Message key (the envelope key).
    pub key: String,
    /// Serialized envelope.
    pub value: Vec<u8>,
}

/// A publish/subscribe broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Write `message` to `topic`. Returns the number of subscribers that
    /// will see it, where the broker can tell.
    async fn publish(&self, topic: &str, message: BrokerMessage) -> Result<usize, BusError>;

    /// Open a stream of the messages published to `topic` from now on.
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn MessageStream>, BusError>;
}

/// Broker counters.
#[derive(Debug, Default)]
pub struct BrokerStats {
    pub published: AtomicU64,
    pub dropped: AtomicU64,
}

/// In-process broker backed by one broadcast channel per topic.
pub struct InMemoryBroker {
    topics: RwLock<HashMap<String, broadcast::Sender<BrokerMessage>>>,
    capacity: usize,
    stats: BrokerStats,
}

impl InMemoryBroker {
    /// Create a broker with the default per-topic capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a broker buffering up to `capacity` messages per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            stats: BrokerStats::default(),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<BrokerMessage> {
        if let Some(sender) = self.topics.read().get(topic) {
            return sender.clone();
        }
        self.topics
            .write()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe without going through the trait object.
    #[must_use]
    pub fn subscribe_topic(&self, topic: &str) -> Subscription {
        let receiver = self.sender(topic).subscribe();
        debug!(topic, "New subscription created");
        Subscription::new(topic.to_string(), receiver)
    }

    /// Close `topic`. Its subscribers drain what is buffered, then see
    /// [`crate::SubscriptionError::Closed`].
    pub fn close_topic(&self, topic: &str) -> bool {
        let removed = self.topics.write().remove(topic).is_some();
        if removed {
            debug!(topic, "Topic closed");
        }
        removed
    }

    /// Number of live subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    /// Per-subscriber buffer size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counters since creation.
    #[must_use]
    pub fn stats(&self) -> &BrokerStats {
        &self.stats
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, topic: &str, message: BrokerMessage) -> Result<usize, BusError> {
        let key = message.key.clone();
        self.stats.published.fetch_add(1, Ordering::Relaxed);

        match self.sender(topic).send(message) {
            Ok(receivers) => {
                debug!(topic, key = %key, receivers, "Message published");
                Ok(receivers)
            }
            Err(_) => {
                // Nobody listening: the message is gone, as on a broker
                // without retention. Callers rely on their own timeout.
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(topic, key = %key, "Message dropped (no subscribers)");
                Ok(0)
            }
        }
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn MessageStream>, BusError> {
        Ok(Box::new(self.subscribe_topic(topic)))
    }
}
