//! Correlation Registry - turns a one-way broker publish into an awaited call.
//!
//! Flow:
//! 1. Invoker generates a `CorrelationId`
//! 2. Invoker calls `register()` and gets a `WaitHandle`
//! 3. Invoker publishes the request envelope carrying the id
//! 4. The response listener sees the reply and calls `resolve()`
//! 5. Invoker awaits the handle, bounded by a timeout
//!
//! Every entry leaves the map through exactly one `remove`: in `resolve`,
//! on timeout, in `cancel`, or when an unawaited handle is dropped. Whoever
//! removes the entry owns its outcome, so a value is delivered at most once
//! and an entry never outlives its deadline.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::DispatchError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_bus::Envelope;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A call waiting for its response
struct PendingCall<T> {
    /// Single-slot channel to the waiting caller
    sender: oneshot::Sender<T>,
    /// When the call was registered
    created_at: Instant,
    /// Operation name (for logging)
    operation: String,
}

/// Statistics for the correlation registry
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total calls registered
    pub total_registered: AtomicU64,
    /// Total calls resolved with a value
    pub total_completed: AtomicU64,
    /// Total calls that hit their deadline
    pub total_timeouts: AtomicU64,
    /// Total calls cancelled or abandoned
    pub total_cancelled: AtomicU64,
    /// Responses for ids that were not pending (late or spurious)
    pub total_unknown: AtomicU64,
}

/// Point-in-time copy of [`PendingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStatsSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub unknown: u64,
}

impl PendingStats {
    pub fn snapshot(&self) -> PendingStatsSnapshot {
        PendingStatsSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            completed: self.total_completed.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            cancelled: self.total_cancelled.load(Ordering::Relaxed),
            unknown: self.total_unknown.load(Ordering::Relaxed),
        }
    }
}

struct Inner<T> {
    pending: DashMap<CorrelationId, PendingCall<T>>,
    stats: PendingStats,
}

/// Table of outstanding calls, keyed by correlation id.
///
/// Cheap to clone; clones share the same table. Each invoker/listener pair
/// is wired with its own instance.
pub struct CorrelationRegistry<T = Envelope> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CorrelationRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> Default for CorrelationRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> CorrelationRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: DashMap::new(),
                stats: PendingStats::default(),
            }),
        }
    }

    /// Open a response slot for `correlation_id`.
    ///
    /// Fails with `DuplicateCorrelationId` if the id is already pending.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        operation: &str,
    ) -> Result<WaitHandle<T>, DispatchError> {
        let receiver = match self.inner.pending.entry(correlation_id.clone()) {
            Entry::Occupied(_) => {
                warn!(correlation_id = %correlation_id, operation, "Duplicate correlation id");
                return Err(DispatchError::DuplicateCorrelationId(correlation_id));
            }
            Entry::Vacant(slot) => {
                let (sender, receiver) = oneshot::channel();
                slot.insert(PendingCall {
                    sender,
                    created_at: Instant::now(),
                    operation: operation.to_string(),
                });
                receiver
            }
        };

        self.inner.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(correlation_id = %correlation_id, operation, "Registered pending call");

        Ok(WaitHandle {
            correlation_id,
            receiver,
            inner: self.inner.clone(),
            settled: false,
        })
    }

    /// Deliver `value` to the caller waiting on `correlation_id`.
    ///
    /// Returns false, and drops `value`, when the id is not pending: the
    /// response is late (the call timed out) or spurious.
    pub fn resolve(&self, correlation_id: &str, value: T) -> bool {
        let Some((id, call)) = self.inner.pending.remove(correlation_id) else {
            self.inner.stats.total_unknown.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id, "Response for unknown or expired correlation id");
            return false;
        };

        let elapsed = call.created_at.elapsed();
        match call.sender.send(value) {
            Ok(()) => {
                self.inner.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %id,
                    operation = %call.operation,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Resolved pending call"
                );
                true
            }
            Err(_) => {
                // Waiter went away between our remove and send.
                self.inner.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(correlation_id = %id, "Pending call receiver dropped");
                false
            }
        }
    }

    /// Wait for the response of `handle`, at most `timeout`.
    pub async fn wait(&self, handle: WaitHandle<T>, timeout: Duration) -> Result<T, DispatchError> {
        handle.wait(timeout).await
    }

    /// Cancel a pending call. Its waiter fails with `Cancelled`.
    pub fn cancel(&self, correlation_id: &str) -> bool {
        if self.inner.pending.remove(correlation_id).is_some() {
            self.inner.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id, "Cancelled pending call");
            true
        } else {
            false
        }
    }

    /// Number of calls currently outstanding
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Check if a correlation ID is pending
    pub fn is_pending(&self, correlation_id: &str) -> bool {
        self.inner.pending.contains_key(correlation_id)
    }

    pub fn stats(&self) -> &PendingStats {
        &self.inner.stats
    }
}

/// Receiving end of one pending call.
///
/// Dropping a handle that was never awaited removes its entry.
#[must_use = "a registered call must be awaited"]
pub struct WaitHandle<T = Envelope> {
    correlation_id: CorrelationId,
    receiver: oneshot::Receiver<T>,
    inner: Arc<Inner<T>>,
    settled: bool,
}

impl<T> WaitHandle<T> {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Wait until resolved, cancelled, or `timeout` elapses.
    pub async fn wait(mut self, timeout: Duration) -> Result<T, DispatchError> {
        let outcome = match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(DispatchError::Cancelled(self.correlation_id.clone())),
            Err(_elapsed) => {
                if self.inner.pending.remove(&self.correlation_id).is_some() {
                    self.inner.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        correlation_id = %self.correlation_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Pending call timed out"
                    );
                    Err(DispatchError::ResponseTimeout {
                        correlation_id: self.correlation_id.clone(),
                        timeout,
                    })
                } else {
                    // `resolve` already owns the entry; its send is in flight.
                    match (&mut self.receiver).await {
                        Ok(value) => Ok(value),
                        Err(_) => Err(DispatchError::Cancelled(self.correlation_id.clone())),
                    }
                }
            }
        };
        self.settled = true;
        outcome
    }
}

impl<T> Drop for WaitHandle<T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if self.inner.pending.remove(&self.correlation_id).is_some() {
            self.inner.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %self.correlation_id, "Abandoned pending call removed");
        }
    }
}
