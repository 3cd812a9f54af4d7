//! Adapters: concrete clients behind the outbound ports.

pub mod rest;
pub mod rpc;

pub use rest::{ReqwestRestTransport, TRACE_CONTEXT_HEADER};
pub use rpc::RpcClientSet;
