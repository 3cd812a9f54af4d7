//! # Error Types
//!
//! Parse errors for the string forms of shared identifiers.

use thiserror::Error;

/// A transport name that is not `rest`, `rpc` or `events`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transport: {0}")]
pub struct TransportParseError(pub String);

/// A service name outside the known service set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown service: {0}")]
pub struct ServiceParseError(pub String);

/// Errors resolving an operation from its textual forms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationParseError {
    /// No operation with this name exists on the service.
    #[error("unknown operation {operation} on service {service}")]
    UnknownOperation { service: String, operation: String },

    /// No operation is bound to this event key.
    #[error("unknown event key: {0}")]
    UnknownEventKey(String),
}
