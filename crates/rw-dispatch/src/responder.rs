//! Request-Handling Loop (responder side).
//!
//! A service builds a [`HandlerTable`] of typed handlers at startup, wraps it
//! in a [`Responder`] and runs it behind a consumer loop on its own topic.
//! Every request gets exactly one answer on the results topic:
//!
//! | Outcome | Response key | Payload |
//! |---------|--------------|---------|
//! | handler succeeded | `response` | serialized response |
//! | handler failed, bad payload, unknown key | `response:error` | `{"error": "...", "kind": "..."}` |
//!
//! Request keys are resolved through the responder's event routes. By
//! default these are the catalogue event keys; deployments that rename
//! events pass the directory's routes via [`Responder::with_routes`].

use crate::domain::error::{HandlerError, TableError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use rw_telemetry::TracePropagator;
use shared_bus::{Envelope, EventPublisher, MessageHandler, RESPONSE_KEY};
use shared_types::{Operation, OperationId, ServiceName};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn, Instrument};

type ErasedHandler =
    Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, Result<Vec<u8>, HandlerError>> + Send + Sync>;

/// Typed handlers of one service, keyed by operation.
pub struct HandlerTable {
    service: ServiceName,
    handlers: HashMap<OperationId, ErasedHandler>,
}

impl HandlerTable {
    pub fn new(service: ServiceName) -> Self {
        Self {
            service,
            handlers: HashMap::new(),
        }
    }

    /// Register the handler of operation `O`.
    ///
    /// Fails if `O` belongs to another service or already has a handler.
    pub fn register<O, F, Fut>(&mut self, handler: F) -> Result<&mut Self, TableError>
    where
        O: Operation,
        F: Fn(O::Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O::Response, HandlerError>> + Send + 'static,
    {
        if O::ID.service() != self.service {
            return Err(TableError::WrongService {
                operation: O::ID,
                owner: O::ID.service(),
                service: self.service,
            });
        }
        if self.handlers.contains_key(&O::ID) {
            return Err(TableError::Duplicate(O::ID));
        }

        let handler = Arc::new(handler);
        let erased: ErasedHandler = Arc::new(move |payload: Vec<u8>| {
            let handler = handler.clone();
            async move {
                let request: O::Request = serde_json::from_slice(&payload)
                    .map_err(|e| HandlerError::InvalidRequest(e.to_string()))?;
                let response = handler(request).await?;
                serde_json::to_vec(&response).map_err(|e| HandlerError::Internal(e.to_string()))
            }
            .boxed()
        });
        self.handlers.insert(O::ID, erased);
        Ok(self)
    }

    /// Fail with the operations of this service that have no handler.
    pub fn ensure_complete(&self) -> Result<(), TableError> {
        let missing: Vec<OperationId> = OperationId::for_service(self.service)
            .filter(|op| !self.handlers.contains_key(op))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TableError::Incomplete {
                service: self.service,
                missing,
            })
        }
    }

    pub fn service(&self) -> ServiceName {
        self.service
    }

    pub fn operations(&self) -> impl Iterator<Item = OperationId> + '_ {
        self.handlers.keys().copied()
    }

    /// Catalogue event key of every operation of this service.
    pub fn default_routes(&self) -> HashMap<String, OperationId> {
        OperationId::for_service(self.service)
            .map(|op| (op.event_key().to_string(), op))
            .collect()
    }

    async fn dispatch(
        &self,
        operation: OperationId,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, HandlerError> {
        let handler = self
            .handlers
            .get(&operation)
            .ok_or_else(|| HandlerError::Unsupported(format!("{operation} on {}", self.service)))?;
        handler(payload).await
    }
}

/// Responder counters.
#[derive(Debug, Default)]
pub struct ResponderStats {
    pub handled: AtomicU64,
    pub failed: AtomicU64,
    pub unroutable: AtomicU64,
    pub publish_errors: AtomicU64,
}

/// [`MessageHandler`] running a [`HandlerTable`] and publishing results.
pub struct Responder {
    table: Arc<HandlerTable>,
    routes: HashMap<String, OperationId>,
    publisher: Arc<dyn EventPublisher>,
    propagator: Arc<dyn TracePropagator>,
    results_topic: String,
    stats: Arc<ResponderStats>,
}

impl Responder {
    pub fn new(
        table: HandlerTable,
        publisher: Arc<dyn EventPublisher>,
        propagator: Arc<dyn TracePropagator>,
        results_topic: impl Into<String>,
    ) -> Self {
        Self {
            routes: table.default_routes(),
            table: Arc::new(table),
            publisher,
            propagator,
            results_topic: results_topic.into(),
            stats: Arc::new(ResponderStats::default()),
        }
    }

    /// Replace the event key to operation mapping.
    #[must_use]
    pub fn with_routes(mut self, routes: HashMap<String, OperationId>) -> Self {
        self.routes = routes;
        self
    }

    pub fn service(&self) -> ServiceName {
        self.table.service()
    }

    pub fn stats(&self) -> Arc<ResponderStats> {
        self.stats.clone()
    }

    async fn respond(&self, envelope: Envelope) {
        let Envelope {
            key,
            correlation_id,
            payload,
            ..
        } = envelope;

        let outcome = match self.routes.get(&key) {
            Some(&operation) => self.table.dispatch(operation, payload).await,
            None => Err(HandlerError::Unsupported(format!(
                "event '{key}' on {}",
                self.table.service()
            ))),
        };

        if correlation_id.is_empty() {
            self.stats.unroutable.fetch_add(1, Ordering::Relaxed);
            warn!(key = %key, "Request without correlation id, response dropped");
            return;
        }

        let reply = match outcome {
            Ok(bytes) => {
                self.stats.handled.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, correlation_id = %correlation_id, "Request handled");
                Envelope::new(RESPONSE_KEY, correlation_id.clone(), bytes)
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, correlation_id = %correlation_id, error = %e, "Request failed");
                Envelope::error_response_with_kind(correlation_id.clone(), e.kind(), e.message())
            }
        };

        if let Err(e) = self.publisher.publish(&self.results_topic, reply).await {
            self.stats.publish_errors.fetch_add(1, Ordering::Relaxed);
            error!(
                correlation_id = %correlation_id,
                topic = %self.results_topic,
                error = %e,
                "Failed to publish response"
            );
        }
    }
}

#[async_trait]
impl MessageHandler for Responder {
    async fn handle(&self, envelope: Envelope) {
        if envelope.is_response() {
            debug!(correlation_id = %envelope.correlation_id, "Ignoring response on request topic");
            return;
        }
        let span = self.propagator.continue_trace(
            &envelope.trace_context,
            self.table.service().as_str(),
            &envelope.key,
        );
        self.respond(envelope).instrument(span).await;
    }
}
