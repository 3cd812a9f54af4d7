//! # Envelope Wire Format
//!
//! Every message on the broker is a JSON object:
//!
//! ```text
//! {
//!   "key":           "users:get_data_by_username" | "response" | "response:error",
//!   "correlationId": "9c1f...",            (also accepted as "eventId")
//!   "payload":       "<hex of the JSON-encoded request or response>",
//!   "traceContext":  "<hex of the propagated trace context>"
//! }
//! ```
//!
//! `key` decides how `payload` is decoded. `correlationId` and `key` are
//! carried as opaque strings and must survive a round-trip byte for byte.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key of a successful response envelope.
pub const RESPONSE_KEY: &str = "response";

/// Key of a failed response envelope; payload is an [`ErrorPayload`].
pub const ERROR_RESPONSE_KEY: &str = "response:error";

/// Errors from encoding or decoding envelopes and their payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Failed to encode envelope: {0}")]
    Encode(String),

    #[error("Malformed envelope: {0}")]
    Malformed(String),

    #[error("Payload of '{key}' does not match the expected shape: {reason}")]
    Payload { key: String, reason: String },
}

/// A framed broker message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Operation event key, or one of the response keys.
    pub key: String,
    /// Caller-generated token linking a request to its response.
    #[serde(alias = "eventId")]
    pub correlation_id: String,
    /// Serialized request or response.
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,
    /// Opaque trace context, carried untouched.
    #[serde(default, with = "hex::serde")]
    pub trace_context: Vec<u8>,
}

/// Payload of an error response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    /// Machine-readable failure class (`not_found`, `conflict`, ...).
    /// Absent when the responder predates typed errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Envelope {
    /// Build an envelope with an empty trace context.
    pub fn new(key: impl Into<String>, correlation_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            correlation_id: correlation_id.into(),
            payload,
            trace_context: Vec::new(),
        }
    }

    /// Build a request envelope carrying `request` as JSON.
    pub fn request<T: Serialize>(
        key: impl Into<String>,
        correlation_id: impl Into<String>,
        request: &T,
    ) -> Result<Self, EnvelopeError> {
        Ok(Self::new(key, correlation_id, encode_payload(request)?))
    }

    /// Build a success response for `correlation_id`.
    pub fn response<T: Serialize>(
        correlation_id: impl Into<String>,
        response: &T,
    ) -> Result<Self, EnvelopeError> {
        Ok(Self::new(RESPONSE_KEY, correlation_id, encode_payload(response)?))
    }

    /// Build an untyped error response for `correlation_id`.
    pub fn error_response(correlation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::error_payload(
            correlation_id,
            ErrorPayload {
                error: message.into(),
                kind: None,
            },
        )
    }

    /// Build an error response carrying a failure `kind` next to the message.
    pub fn error_response_with_kind(
        correlation_id: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::error_payload(
            correlation_id,
            ErrorPayload {
                error: message.into(),
                kind: Some(kind.into()),
            },
        )
    }

    fn error_payload(correlation_id: impl Into<String>, payload: ErrorPayload) -> Self {
        // Plain string fields always serialize.
        let bytes = serde_json::to_vec(&payload).unwrap_or_default();
        Self::new(ERROR_RESPONSE_KEY, correlation_id, bytes)
    }

    /// Attach a trace context.
    #[must_use]
    pub fn with_trace_context(mut self, trace_context: Vec<u8>) -> Self {
        self.trace_context = trace_context;
        self
    }

    /// Whether this envelope answers an earlier request.
    pub fn is_response(&self) -> bool {
        self.key == RESPONSE_KEY || self.key == ERROR_RESPONSE_KEY
    }

    /// Whether this envelope is an error response.
    pub fn is_error_response(&self) -> bool {
        self.key == ERROR_RESPONSE_KEY
    }

    /// Decode the payload into `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        serde_json::from_slice(&self.payload).map_err(|e| EnvelopeError::Payload {
            key: self.key.clone(),
            reason: e.to_string(),
        })
    }

    /// Serialize to the broker wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Encode(e.to_string()))
    }

    /// Parse the broker wire format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }
}

/// Serialize a request or response payload.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, EnvelopeError> {
    serde_json::to_vec(value).map_err(|e| EnvelopeError::Encode(e.to_string()))
}
