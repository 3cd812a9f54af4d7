//! # Shared Bus - Broker Messaging for Inter-Service Calls
//!
//! The publish/subscribe half of the dispatch bridge.
//!
//! ```text
//! ┌──────────────┐  EnvelopePublisher   ┌──────────┐   ConsumerLoop   ┌──────────────┐
//! │   Caller     │ ───── publish ─────► │  Broker  │ ──── spawn ────► │ MessageHandler│
//! └──────────────┘   (topic, Envelope)  └──────────┘   per envelope   └──────────────┘
//! ```
//!
//! - [`Envelope`]: the wire frame (key, correlation id, payload, trace context).
//! - [`Broker`]: topic publish/subscribe; [`InMemoryBroker`] in-process,
//!   [`RedisBroker`] across processes.
//! - [`EnvelopePublisher`]: serializes envelopes and stamps the trace context.
//! - [`ConsumerLoop`]: reads a topic, hands each envelope to a handler task.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod broker;
pub mod consumer;
pub mod envelope;
pub mod publisher;
pub mod redis_broker;
pub mod subscriber;

pub use broker::{Broker, BrokerMessage, BrokerStats, BusError, InMemoryBroker};
pub use consumer::{
    ConsumerLoop, ConsumerStats, ConsumerStatsSnapshot, MessageHandler,
    DEFAULT_MAX_CONSECUTIVE_READ_ERRORS,
};
pub use envelope::{
    encode_payload, Envelope, EnvelopeError, ErrorPayload, ERROR_RESPONSE_KEY, RESPONSE_KEY,
};
pub use publisher::{EnvelopePublisher, EventPublisher};
pub use redis_broker::{RedisBroker, RedisStream};
pub use subscriber::{MessageStream, Subscription, SubscriptionError};

/// Maximum messages to buffer per subscriber before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
