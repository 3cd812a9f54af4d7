//! # Realworld Dispatch
//!
//! One call surface for reaching another service's operation, whether it is
//! served over REST, RPC or the message broker.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────── caller ─────────────────────────────┐
//! │  Invoker ──register──► CorrelationRegistry ◄──resolve── Response  │
//! │     │                        ▲                          Collector │
//! │     └─publish(request)       └──────── wait(timeout)        ▲     │
//! └─────┼───────────────────────────────────────────────────────┼─────┘
//!       ▼                                                       │
//!  [service topic] ──► ConsumerLoop ──► Responder ──► [results topic]
//! ```
//!
//! - `domain/`: correlation ids and registry, service directory, errors, config
//! - `ports/`: REST and RPC client traits
//! - `adapters/`: reqwest REST client, per-service RPC routing
//! - [`Invoker`], [`ResponseCollector`], [`Responder`]: the bridge itself

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod invoker;
pub mod listener;
pub mod ports;
pub mod responder;
pub mod wiring;

pub use adapters::{ReqwestRestTransport, RpcClientSet, TRACE_CONTEXT_HEADER};
pub use domain::{
    ConfigError, CorrelationId, CorrelationRegistry, DirectoryError, DispatchConfig,
    DispatchError, HandlerError, HttpMethod, OperationDescriptor, OperationRoutes,
    PendingStats, PendingStatsSnapshot, RestRoute, ServiceDirectory, TableError,
    TransportAddress, WaitHandle,
};
pub use invoker::{Invoker, InvokerBuilder};
pub use listener::ResponseCollector;
pub use ports::{RestRequest, RestTransport, RpcClient, RpcMetadata};
pub use responder::{HandlerTable, Responder, ResponderStats};
pub use wiring::{spawn_responder, spawn_response_listener, ConsumerTask};
