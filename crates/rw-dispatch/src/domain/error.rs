//! Dispatch error types.

use crate::domain::correlation::CorrelationId;
use shared_types::{OperationId, ServiceName, Transport};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single dispatched call.
///
/// Whatever the transport, a failed `invoke` ends in one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Two in-flight calls share an id. Never expected with random ids.
    #[error("correlation id {0} is already pending")]
    DuplicateCorrelationId(CorrelationId),

    #[error("no response to {correlation_id} within {timeout:?}")]
    ResponseTimeout {
        correlation_id: CorrelationId,
        timeout: Duration,
    },

    /// REST/RPC failure or broker publish failure.
    #[error("transport failure (status {status:?}): {cause}")]
    Transport { status: Option<u16>, cause: String },

    #[error("could not decode response of {operation}: {reason}")]
    Decode { operation: String, reason: String },

    #[error("could not encode request of {operation}: {reason}")]
    InvalidRequest { operation: String, reason: String },

    #[error("unknown operation {service}/{operation}")]
    UnknownOperation { service: String, operation: String },

    #[error("no {transport} route to {operation}")]
    NoRoute {
        transport: Transport,
        operation: OperationId,
    },

    /// The responder ran the operation and reported a failure.
    #[error("{operation} failed: {error}")]
    Remote {
        operation: String,
        error: HandlerError,
    },

    #[error("pending call {0} was cancelled")]
    Cancelled(CorrelationId),
}

impl DispatchError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::ResponseTimeout { .. } | DispatchError::Cancelled(_) => true,
            DispatchError::Transport { status, .. } => match status {
                None => true,
                Some(code) => *code == 429 || *code >= 500,
            },
            _ => false,
        }
    }

    /// HTTP status a gateway should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            DispatchError::UnknownOperation { .. } => 404,
            DispatchError::NoRoute { .. } => 501,
            DispatchError::ResponseTimeout { .. } => 504,
            DispatchError::Remote { error, .. } => error.http_status(),
            DispatchError::Transport { .. } | DispatchError::Decode { .. } => 502,
            DispatchError::Cancelled(_) => 503,
            DispatchError::DuplicateCorrelationId(_) | DispatchError::InvalidRequest { .. } => 500,
        }
    }
}

/// Failure of an operation handler on the responding service.
///
/// The display text travels back to the caller in the error envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Wire name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::NotFound(_) => "not_found",
            HandlerError::InvalidRequest(_) => "invalid_request",
            HandlerError::Unauthorized(_) => "unauthorized",
            HandlerError::Conflict(_) => "conflict",
            HandlerError::Unsupported(_) => "unsupported",
            HandlerError::Internal(_) => "internal",
        }
    }

    /// Message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            HandlerError::NotFound(m)
            | HandlerError::InvalidRequest(m)
            | HandlerError::Unauthorized(m)
            | HandlerError::Conflict(m)
            | HandlerError::Unsupported(m)
            | HandlerError::Internal(m) => m,
        }
    }

    /// Rebuild an error received from a responder. Missing or unknown kinds
    /// become [`HandlerError::Internal`].
    pub fn from_parts(kind: Option<&str>, message: String) -> Self {
        match kind {
            Some("not_found") => HandlerError::NotFound(message),
            Some("invalid_request") => HandlerError::InvalidRequest(message),
            Some("unauthorized") => HandlerError::Unauthorized(message),
            Some("conflict") => HandlerError::Conflict(message),
            Some("unsupported") => HandlerError::Unsupported(message),
            _ => HandlerError::Internal(message),
        }
    }

    /// HTTP status a gateway should answer with when a call fails this way.
    pub fn http_status(&self) -> u16 {
        match self {
            HandlerError::NotFound(_) => 404,
            HandlerError::InvalidRequest(_) => 400,
            HandlerError::Unauthorized(_) => 401,
            HandlerError::Conflict(_) => 409,
            HandlerError::Unsupported(_) => 501,
            HandlerError::Internal(_) => 502,
        }
    }
}

/// Errors building a responder's handler table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("handler for {0} registered twice")]
    Duplicate(OperationId),

    #[error("{operation} belongs to {owner}, not {service}")]
    WrongService {
        operation: OperationId,
        owner: ServiceName,
        service: ServiceName,
    },

    #[error("{service} has no handler for: {}", format_ops(.missing))]
    Incomplete {
        service: ServiceName,
        missing: Vec<OperationId>,
    },
}

/// Errors loading or querying the service directory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("cannot read directory file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("malformed directory: {0}")]
    Parse(String),

    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("unknown operation {service}/{operation}")]
    UnknownOperation { service: String, operation: String },

    #[error("event '{event}' is used by both {first} and {second}")]
    DuplicateEvent {
        event: String,
        first: OperationId,
        second: OperationId,
    },

    #[error("{operation} cannot use reserved event name '{event}'")]
    ReservedEvent { operation: OperationId, event: String },

    #[error("no directory entry for: {}", format_ops(.0))]
    Incomplete(Vec<OperationId>),
}

/// Invalid dispatch configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

fn format_ops(ops: &[OperationId]) -> String {
    ops.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
