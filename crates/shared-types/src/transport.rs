//! # Transport Kinds
//!
//! The three wire protocols a downstream operation can be reached over.
//! The transport is always passed explicitly through call signatures; it is
//! never stashed in a per-call context bag.

use crate::errors::TransportParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol used to reach a downstream operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Synchronous HTTP/JSON.
    Rest,
    /// Synchronous RPC through a per-service stub.
    Rpc,
    /// Publish/subscribe over the message broker, correlated by id.
    Events,
}

impl Transport {
    /// All transports, in declaration order.
    pub const ALL: [Transport; 3] = [Transport::Rest, Transport::Rpc, Transport::Events];

    /// Wire name of the transport (`"rest"`, `"rpc"`, `"events"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Transport::Rest => "rest",
            Transport::Rpc => "rpc",
            Transport::Events => "events",
        }
    }

    /// Whether the protocol is request/response on its own.
    ///
    /// Only the events transport needs correlation machinery.
    #[must_use]
    pub const fn is_synchronous(&self) -> bool {
        !matches!(self, Transport::Events)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = TransportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" | "http" => Ok(Transport::Rest),
            "rpc" | "grpc" => Ok(Transport::Rpc),
            "events" | "event" => Ok(Transport::Events),
            _ => Err(TransportParseError(s.to_string())),
        }
    }
}
