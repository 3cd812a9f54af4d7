//! # Subscriptions
//!
//! The receiving side of a topic. Broker implementations hand out a boxed
//! [`MessageStream`]; the in-memory broker's stream is [`Subscription`].

use crate::broker::BrokerMessage;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors from reading a subscription.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The reader fell behind and `n` messages were dropped.
    #[error("Subscriber lagged, {0} messages dropped")]
    Lagged(u64),

    /// A transient read failure. The stream may still yield messages.
    #[error("Read failed: {0}")]
    Read(String),

    /// The topic was closed; no further messages will arrive.
    #[error("Subscription closed")]
    Closed,
}

/// A stream of raw messages from one topic.
#[async_trait]
pub trait MessageStream: Send {
    /// Wait for the next message.
    async fn next_message(&mut self) -> Result<BrokerMessage, SubscriptionError>;

    /// Topic this stream reads.
    fn topic(&self) -> &str;
}

/// Subscription to a topic of the in-memory broker.
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<BrokerMessage>,
}

impl Subscription {
    pub(crate) fn new(topic: String, receiver: broadcast::Receiver<BrokerMessage>) -> Self {
        Self { topic, receiver }
    }

    /// Receive the next message.
    pub async fn recv(&mut self) -> Result<BrokerMessage, SubscriptionError> {
        match self.receiver.recv().await {
            Ok(message) => Ok(message),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(SubscriptionError::Lagged(n)),
            Err(broadcast::error::RecvError::Closed) => Err(SubscriptionError::Closed),
        }
    }
}

#[async_trait]
impl MessageStream for Subscription {
    async fn next_message(&mut self) -> Result<BrokerMessage, SubscriptionError> {
        self.recv().await
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}
