//! # Broker Consumer Loop
//!
//! A long-lived reader of one topic. Each decoded envelope is handed to a
//! [`MessageHandler`] on its own task, so a slow handler never stalls
//! intake.
//!
//! ## Failure policy
//!
//! | Event | Action |
//! |-------|--------|
//! | Undecodable message | log, count, skip |
//! | Lagged reader | log, count, continue |
//! | Transient read error | log, continue; fatal after N in a row |
//! | Topic closed | fatal |
//!
//! Fatal conditions end the loop with [`BusError::ConnectionLost`] so the
//! owning process can shut down in order. The shutdown signal stops new
//! reads; handlers already running finish on their own.

use crate::broker::{Broker, BusError};
use crate::envelope::Envelope;
use crate::subscriber::{MessageStream, SubscriptionError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Consecutive read errors tolerated before the connection counts as lost.
pub const DEFAULT_MAX_CONSECUTIVE_READ_ERRORS: u32 = 16;

/// Receives every envelope read by a [`ConsumerLoop`].
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, envelope: Envelope);
}

/// Consumer loop counters.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    pub received: AtomicU64,
    pub dispatched: AtomicU64,
    pub decode_errors: AtomicU64,
    pub read_errors: AtomicU64,
    pub lagged: AtomicU64,
}

impl ConsumerStats {
    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> ConsumerStatsSnapshot {
        ConsumerStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            lagged: self.lagged.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStatsSnapshot {
    pub received: u64,
    pub dispatched: u64,
    pub decode_errors: u64,
    pub read_errors: u64,
    pub lagged: u64,
}

/// Reads one topic and fans envelopes out to a handler.
pub struct ConsumerLoop {
    topic: String,
    stream: Box<dyn MessageStream>,
    max_consecutive_errors: u32,
    stats: Arc<ConsumerStats>,
}

impl ConsumerLoop {
    /// Subscribe to `topic`. Done once, at startup.
    pub async fn connect(broker: &dyn Broker, topic: &str) -> Result<Self, BusError> {
        let stream = broker.subscribe(topic).await?;
        info!(topic, "Consumer connected");
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already opened stream.
    pub fn from_stream(stream: Box<dyn MessageStream>) -> Self {
        Self {
            topic: stream.topic().to_string(),
            stream,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_READ_ERRORS,
            stats: Arc::new(ConsumerStats::default()),
        }
    }

    /// Set how many consecutive read errors end the loop.
    #[must_use]
    pub fn with_max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = max.max(1);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Shared handle to the counters, valid after `run` consumes the loop.
    pub fn stats(&self) -> Arc<ConsumerStats> {
        self.stats.clone()
    }

    fn connection_lost(&self, reason: impl Into<String>) -> BusError {
        BusError::ConnectionLost {
            topic: self.topic.clone(),
            reason: reason.into(),
        }
    }

    /// Read until `shutdown` turns true (or its sender is dropped), or the
    /// connection is lost.
    #[instrument(skip_all, fields(topic = %self.topic))]
    pub async fn run(
        mut self,
        handler: Arc<dyn MessageHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), BusError> {
        info!("Consumer loop started");
        let mut consecutive_errors = 0u32;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = self.stream.next_message() => next,
            };

            match next {
                Ok(message) => {
                    consecutive_errors = 0;
                    self.stats.received.fetch_add(1, Ordering::Relaxed);

                    let envelope = match Envelope::from_bytes(&message.value) {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                            warn!(key = %message.key, error = %e, "Skipping undecodable message");
                            continue;
                        }
                    };

                    debug!(
                        key = %envelope.key,
                        correlation_id = %envelope.correlation_id,
                        "Dispatching envelope"
                    );
                    self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
                    let handler = handler.clone();
                    tokio::spawn(async move { handler.handle(envelope).await });
                }
                Err(SubscriptionError::Lagged(n)) => {
                    self.stats.lagged.fetch_add(n, Ordering::Relaxed);
                    warn!(dropped = n, "Consumer lagged, messages dropped");
                }
                Err(SubscriptionError::Read(reason)) => {
                    self.stats.read_errors.fetch_add(1, Ordering::Relaxed);
                    consecutive_errors += 1;
                    warn!(
                        error = %reason,
                        consecutive_errors,
                        max = self.max_consecutive_errors,
                        "Broker read failed"
                    );
                    if consecutive_errors >= self.max_consecutive_errors {
                        error!("Too many consecutive read errors, giving up");
                        return Err(self.connection_lost(format!(
                            "{consecutive_errors} consecutive read errors, last: {reason}"
                        )));
                    }
                }
                Err(SubscriptionError::Closed) => {
                    error!("Subscription closed by broker");
                    return Err(self.connection_lost("subscription closed"));
                }
            }
        }

        info!("Consumer loop stopped");
        Ok(())
    }
}
