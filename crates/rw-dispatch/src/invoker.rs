//! Unified Invoker - one call surface over REST, RPC and broker events.
//!
//! ```text
//! invoke(transport, operation, request)
//!   ├─ Rest   → directory URL + verb → RestTransport
//!   ├─ Rpc    → directory method     → RpcClientSet[service]
//!   └─ Events → register id → publish envelope → await registry (timeout)
//! ```
//!
//! Whatever the transport, the caller gets the typed response or a
//! [`DispatchError`].

use crate::adapters::rpc::RpcClientSet;
use crate::domain::config::DispatchConfig;
use crate::domain::correlation::CorrelationId;
use crate::domain::directory::{HttpMethod, ServiceDirectory, TransportAddress};
use crate::domain::error::{DirectoryError, DispatchError, HandlerError};
use crate::domain::pending::CorrelationRegistry;
use crate::ports::outbound::{RestRequest, RestTransport, RpcMetadata};
use rw_telemetry::{NoopPropagator, TracePropagator};
use serde_json::Value;
use shared_bus::{Envelope, ErrorPayload, EventPublisher};
use shared_types::dto::{ValidateRequest, ValidationResponse};
use shared_types::operations::ValidateRequestOp;
use shared_types::{Operation, OperationId, ServiceName, Transport};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

/// Dispatches operations over any transport.
#[derive(Clone)]
pub struct Invoker {
    directory: Arc<ServiceDirectory>,
    registry: CorrelationRegistry,
    publisher: Arc<dyn EventPublisher>,
    rest: Option<Arc<dyn RestTransport>>,
    rpc: RpcClientSet,
    propagator: Arc<dyn TracePropagator>,
    config: DispatchConfig,
}

/// Builder for [`Invoker`].
pub struct InvokerBuilder {
    invoker: Invoker,
}

impl InvokerBuilder {
    #[must_use]
    pub fn rest(mut self, rest: Arc<dyn RestTransport>) -> Self {
        self.invoker.rest = Some(rest);
        self
    }

    #[must_use]
    pub fn rpc(mut self, rpc: RpcClientSet) -> Self {
        self.invoker.rpc = rpc;
        self
    }

    #[must_use]
    pub fn propagator(mut self, propagator: Arc<dyn TracePropagator>) -> Self {
        self.invoker.propagator = propagator;
        self
    }

    #[must_use]
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.invoker.config = config;
        self
    }

    pub fn build(self) -> Invoker {
        self.invoker
    }
}

impl Invoker {
    /// Start building an invoker. The registry must be the one the response
    /// listener resolves into.
    pub fn builder(
        directory: Arc<ServiceDirectory>,
        registry: CorrelationRegistry,
        publisher: Arc<dyn EventPublisher>,
    ) -> InvokerBuilder {
        InvokerBuilder {
            invoker: Invoker {
                directory,
                registry,
                publisher,
                rest: None,
                rpc: RpcClientSet::new(),
                propagator: Arc::new(NoopPropagator),
                config: DispatchConfig::default(),
            },
        }
    }

    /// Call `O` over `transport` with a typed request.
    pub async fn invoke<O: Operation>(
        &self,
        transport: Transport,
        request: &O::Request,
    ) -> Result<O::Response, DispatchError> {
        let payload = serde_json::to_value(request).map_err(|e| DispatchError::InvalidRequest {
            operation: O::ID.to_string(),
            reason: e.to_string(),
        })?;
        let value = self.invoke_operation(transport, O::ID, payload).await?;
        serde_json::from_value(value).map_err(|e| DispatchError::Decode {
            operation: O::ID.to_string(),
            reason: e.to_string(),
        })
    }

    /// Call an operation named by strings, with an untyped payload.
    ///
    /// For callers that route on data, such as a gateway forwarding
    /// `/{service}/{operation}`.
    pub async fn invoke_raw(
        &self,
        transport: Transport,
        service: &str,
        operation: &str,
        payload: Value,
    ) -> Result<Value, DispatchError> {
        let unknown = || DispatchError::UnknownOperation {
            service: service.to_string(),
            operation: operation.to_string(),
        };
        let service_name: ServiceName = service.parse().map_err(|_| unknown())?;
        let id = OperationId::find(service_name, operation).map_err(|_| unknown())?;
        self.invoke_operation(transport, id, payload).await
    }

    /// Ask the auth service whether `access_token` may call `target`
    /// (a REST path, RPC method or event key) over `transport`.
    pub async fn validate_request(
        &self,
        transport: Transport,
        access_token: &str,
        target: &str,
    ) -> Result<ValidationResponse, DispatchError> {
        let request = ValidateRequest {
            transport,
            target: target.to_string(),
            access_token: access_token.to_string(),
        };
        self.invoke::<ValidateRequestOp>(transport, &request).await
    }

    /// Dispatch a catalogue operation with a JSON payload.
    pub async fn invoke_operation(
        &self,
        transport: Transport,
        operation: OperationId,
        payload: Value,
    ) -> Result<Value, DispatchError> {
        let span = info_span!(
            "invoke",
            service = %operation.service(),
            operation = operation.name(),
            %transport,
        );
        async move {
            let started = Instant::now();
            let address = self
                .directory
                .descriptor(operation)
                .map_err(|e| directory_miss(operation, e))?
                .require(transport)?;

            let result = match address {
                TransportAddress::Rest { url, method } => {
                    self.call_rest(operation, url, method, payload).await
                }
                TransportAddress::Rpc { service, method } => {
                    self.call_rpc(operation, service, &method, payload).await
                }
                TransportAddress::Events { topic, event } => {
                    self.call_events(operation, &topic, &event, payload).await
                }
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => debug!(elapsed_ms, "Invoke succeeded"),
                Err(e) => warn!(elapsed_ms, error = %e, "Invoke failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn call_rest(
        &self,
        operation: OperationId,
        url: String,
        method: HttpMethod,
        payload: Value,
    ) -> Result<Value, DispatchError> {
        let rest = self.rest.as_ref().ok_or(DispatchError::NoRoute {
            transport: Transport::Rest,
            operation,
        })?;
        rest.send(RestRequest {
            operation: operation.to_string(),
            method,
            url,
            body: payload,
            trace_context: self.propagator.inject(),
            timeout: self.config.rest_timeout,
        })
        .await
    }

    async fn call_rpc(
        &self,
        operation: OperationId,
        service: ServiceName,
        method: &str,
        payload: Value,
    ) -> Result<Value, DispatchError> {
        let client = self.rpc.get(service).ok_or(DispatchError::NoRoute {
            transport: Transport::Rpc,
            operation,
        })?;
        let deadline = self.config.rpc_timeout;
        let metadata = RpcMetadata {
            trace_context: self.propagator.inject(),
            deadline: Some(deadline),
        };
        match tokio::time::timeout(deadline, client.call(method, payload, metadata)).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Transport {
                status: None,
                cause: format!("{method} exceeded its {deadline:?} deadline"),
            }),
        }
    }

    async fn call_events(
        &self,
        operation: OperationId,
        topic: &str,
        event: &str,
        payload: Value,
    ) -> Result<Value, DispatchError> {
        let correlation_id = CorrelationId::new();
        let bytes = serde_json::to_vec(&payload).map_err(|e| DispatchError::InvalidRequest {
            operation: operation.to_string(),
            reason: e.to_string(),
        })?;

        // Register before publishing so a fast response cannot be missed.
        let handle = self.registry.register(correlation_id.clone(), operation.name())?;

        let envelope = Envelope::new(event, correlation_id.as_str(), bytes)
            .with_trace_context(self.propagator.inject());
        self.publisher
            .publish(topic, envelope)
            .await
            .map_err(|e| DispatchError::Transport {
                status: None,
                cause: e.to_string(),
            })?;
        debug!(correlation_id = %correlation_id, topic, event, "Request published");

        let response = handle.wait(self.config.events_timeout).await?;

        if response.is_error_response() {
            let error = match response.decode_payload::<ErrorPayload>() {
                Ok(p) => HandlerError::from_parts(p.kind.as_deref(), p.error),
                Err(_) => {
                    HandlerError::Internal(String::from_utf8_lossy(&response.payload).into_owned())
                }
            };
            return Err(DispatchError::Remote {
                operation: operation.to_string(),
                error,
            });
        }
        response
            .decode_payload::<Value>()
            .map_err(|e| DispatchError::Decode {
                operation: operation.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &ServiceDirectory {
        &self.directory
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }
}

fn directory_miss(operation: OperationId, error: DirectoryError) -> DispatchError {
    match error {
        DirectoryError::UnknownOperation { service, operation } => {
            DispatchError::UnknownOperation { service, operation }
        }
        other => DispatchError::UnknownOperation {
            service: operation.service().to_string(),
            operation: format!("{} ({other})", operation.name()),
        },
    }
}
