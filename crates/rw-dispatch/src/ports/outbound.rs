//! Outbound ports for the synchronous transports.
//!
//! REST and RPC are request/response already, so the invoker calls them
//! directly. Implementations own the wire protocol; the invoker only sees
//! JSON values in and out.

use crate::domain::directory::HttpMethod;
use crate::domain::error::DispatchError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// One REST call.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    /// Operation label for errors and logs ("users/getUserData").
    pub operation: String,
    pub method: HttpMethod,
    pub url: String,
    /// Request payload. Sent as query parameters for GET/DELETE, as a JSON
    /// body otherwise.
    pub body: Value,
    /// Opaque trace context to forward.
    pub trace_context: Vec<u8>,
    pub timeout: Duration,
}

/// HTTP client port.
#[async_trait]
pub trait RestTransport: Send + Sync {
    /// Perform the call; non-2xx answers fail with `DispatchError::Transport`.
    async fn send(&self, request: RestRequest) -> Result<Value, DispatchError>;
}

/// Per-call RPC metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcMetadata {
    /// Opaque trace context to forward.
    pub trace_context: Vec<u8>,
    /// Deadline the invoker enforces on the call.
    pub deadline: Option<Duration>,
}

/// Typed RPC stub of one downstream service, seen through JSON.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn call(
        &self,
        method: &str,
        request: Value,
        metadata: RpcMetadata,
    ) -> Result<Value, DispatchError>;
}
