//! # Redis Streams Broker
//!
//! Networked [`Broker`] for deployments that split services across
//! processes. Every topic is a Redis stream:
//!
//! - publish: `XADD <topic> MAXLEN ~ <max_len> * key <key> value <bytes>`
//! - subscribe: remember the stream's last entry id, then `XREAD BLOCK`
//!   from there on a connection owned by the subscription
//!
//! Every subscriber sees every entry added after it subscribed, matching
//! the fan-out of [`crate::InMemoryBroker`]. Redis failures while reading
//! surface as [`SubscriptionError::Read`]; the consumer loop decides when
//! they become fatal.

use crate::broker::{Broker, BrokerMessage, BusError};
use crate::subscriber::{MessageStream, SubscriptionError};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamMaxlen, StreamRangeReply, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Stream field holding the message key.
const KEY_FIELD: &str = "key";
/// Stream field holding the serialized envelope.
const VALUE_FIELD: &str = "value";
/// Id to read from when the stream does not exist yet.
const STREAM_ID_START: &str = "0-0";

/// Approximate number of entries kept per stream.
pub const DEFAULT_STREAM_MAX_LEN: usize = 10_000;
/// How long one `XREAD` waits for new entries.
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_secs(1);
/// Entries fetched per `XREAD`.
pub const DEFAULT_READ_BATCH: usize = 100;
/// Pause after a failed read before the error is reported.
const READ_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Broker backed by Redis Streams.
pub struct RedisBroker {
    client: Client,
    publish_con: MultiplexedConnection,
    max_len: usize,
    block_timeout: Duration,
    read_batch: usize,
}

impl RedisBroker {
    /// Connect to the Redis server at `url` (`redis://host:port/db`).
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let connect_error = |e: redis::RedisError| BusError::Connect {
            reason: e.to_string(),
        };
        let client = Client::open(url).map_err(connect_error)?;
        let publish_con = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(connect_error)?;
        info!(
            addr = ?client.get_connection_info().addr,
            "Connected to Redis broker"
        );

        Ok(Self {
            client,
            publish_con,
            max_len: DEFAULT_STREAM_MAX_LEN,
            block_timeout: DEFAULT_BLOCK_TIMEOUT,
            read_batch: DEFAULT_READ_BATCH,
        })
    }

    /// Approximate retention per stream.
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.max(1);
        self
    }

    /// Upper bound of a single blocking read.
    #[must_use]
    pub fn with_block_timeout(mut self, block_timeout: Duration) -> Self {
        self.block_timeout = block_timeout;
        self
    }
}

#[async_trait]
impl Broker for RedisBroker {
    /// Entries persist in the stream, so the returned count is 1 on
    /// success whether or not anyone is reading yet.
    async fn publish(&self, topic: &str, message: BrokerMessage) -> Result<usize, BusError> {
        let mut con = self.publish_con.clone();
        let id: String = con
            .xadd_maxlen(
                topic,
                StreamMaxlen::Approx(self.max_len),
                "*",
                &[
                    (KEY_FIELD, message.key.as_bytes()),
                    (VALUE_FIELD, message.value.as_slice()),
                ],
            )
            .await
            .map_err(|e| BusError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        debug!(topic, key = %message.key, entry = %id, "Message appended to stream");
        Ok(1)
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn MessageStream>, BusError> {
        let subscribe_error = |e: redis::RedisError| BusError::Subscribe {
            topic: topic.to_string(),
            reason: e.to_string(),
        };
        // Own connection: a blocking XREAD would stall everything else
        // multiplexed onto the same one.
        let mut con = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(subscribe_error)?;

        let newest: StreamRangeReply = con
            .xrevrange_count(topic, "+", "-", 1)
            .await
            .map_err(subscribe_error)?;
        let last_id = newest
            .ids
            .first()
            .map(|entry| entry.id.clone())
            .unwrap_or_else(|| STREAM_ID_START.to_string());
        debug!(topic, last_id = %last_id, "New stream subscription created");

        Ok(Box::new(RedisStream {
            topic: topic.to_string(),
            con,
            last_id,
            options: StreamReadOptions::default()
                .count(self.read_batch)
                .block(self.block_timeout.as_millis().try_into().unwrap_or(usize::MAX)),
            buffer: VecDeque::new(),
        }))
    }
}

/// Subscription to one Redis stream.
pub struct RedisStream {
    topic: String,
    con: MultiplexedConnection,
    last_id: String,
    options: StreamReadOptions,
    buffer: VecDeque<BrokerMessage>,
}

#[async_trait]
impl MessageStream for RedisStream {
    async fn next_message(&mut self) -> Result<BrokerMessage, SubscriptionError> {
        loop {
            if let Some(message) = self.buffer.pop_front() {
                return Ok(message);
            }

            let reply: StreamReadReply = match self
                .con
                .xread_options(&[&self.topic], &[&self.last_id], &self.options)
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    tokio::time::sleep(READ_RETRY_DELAY).await;
                    return Err(SubscriptionError::Read(e.to_string()));
                }
            };
            // An empty reply means the block timeout expired.
            self.buffer
                .extend(messages_from_reply(reply, &self.topic, &mut self.last_id));
        }
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}

/// Turn an `XREAD` reply into broker messages and advance `last_id` past
/// every entry seen, including ones that had to be skipped.
fn messages_from_reply(
    reply: StreamReadReply,
    topic: &str,
    last_id: &mut String,
) -> Vec<BrokerMessage> {
    let mut messages = Vec::new();
    for stream in reply.keys.into_iter().filter(|s| s.key == topic) {
        for entry in stream.ids {
            let key: Option<String> = entry.get(KEY_FIELD);
            let value: Option<Vec<u8>> = entry.get(VALUE_FIELD);
            match (key, value) {
                (Some(key), Some(value)) => messages.push(BrokerMessage { key, value }),
                _ => warn!(topic, entry = %entry.id, "Skipping stream entry without key/value"),
            }
            *last_id = entry.id;
        }
    }
    messages
}
