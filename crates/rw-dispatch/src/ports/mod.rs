//! Ports: the protocol clients the invoker calls through.

pub mod outbound;

pub use outbound::{RestRequest, RestTransport, RpcClient, RpcMetadata};
