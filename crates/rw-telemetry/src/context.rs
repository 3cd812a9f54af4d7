//! Trace context propagation across service boundaries.
//!
//! A message leaving a service carries the caller's trace context as opaque
//! bytes (HTTP header, RPC metadata, or the envelope's `trace_context`
//! field). The receiving side turns those bytes back into a parent for its
//! own span, so one distributed trace spans the whole call.
//!
//! ## Flow
//!
//! 1. Caller: `propagator.inject()` serializes the active span context
//! 2. The bytes travel with the message untouched
//! 3. Responder: `propagator.continue_trace(bytes, operation)` opens a span
//!    linked to the caller's trace

use opentelemetry::{
    trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState},
    Context,
};
use serde::{Deserialize, Serialize};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Trace context that can be serialized and sent across process boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagatedContext {
    /// Trace ID (32 hex characters)
    pub trace_id: String,
    /// Parent span ID (16 hex characters)
    pub span_id: String,
    /// Trace flags (sampled, etc.)
    pub trace_flags: u8,
}

impl PropagatedContext {
    /// Create an empty context (no parent trace)
    pub fn empty() -> Self {
        Self {
            trace_id: "00000000000000000000000000000000".to_string(),
            span_id: "0000000000000000".to_string(),
            trace_flags: 0,
        }
    }

    /// Check if this context is valid (has a real trace)
    pub fn is_valid(&self) -> bool {
        !self.trace_id.chars().all(|c| c == '0')
    }

    /// Encode for transport. An invalid context encodes to no bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        if !self.is_valid() {
            return Vec::new();
        }
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Decode bytes produced by [`PropagatedContext::to_bytes`].
    ///
    /// Empty or malformed carriers decode to the empty context; a broken
    /// trace header must never fail the call it rides on.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        serde_json::from_slice(bytes).unwrap_or_else(|_| Self::empty())
    }

    /// Convert to a trace context for creating child spans.
    pub fn to_context(&self) -> TraceContext {
        if !self.is_valid() {
            return TraceContext::new();
        }

        let trace_id = TraceId::from_hex(&self.trace_id).unwrap_or(TraceId::INVALID);
        let span_id = SpanId::from_hex(&self.span_id).unwrap_or(SpanId::INVALID);

        let span_context = SpanContext::new(
            trace_id,
            span_id,
            TraceFlags::new(self.trace_flags),
            true, // remote: came from another process
            TraceState::default(),
        );

        TraceContext {
            span_context: Some(span_context),
        }
    }
}

/// Wrapper for an OpenTelemetry span context with helper methods.
pub struct TraceContext {
    span_context: Option<SpanContext>,
}

impl TraceContext {
    /// Create a new empty trace context.
    pub fn new() -> Self {
        Self { span_context: None }
    }

    /// Extract the trace context of the current `tracing` span.
    ///
    /// Empty unless the subscriber carries the OpenTelemetry layer.
    pub fn extract_current() -> Self {
        let context = tracing::Span::current().context();
        let span_context = context.span().span_context().clone();

        Self {
            span_context: if span_context.is_valid() {
                Some(span_context)
            } else {
                None
            },
        }
    }

    /// Convert to a propagatable format for serialization.
    pub fn to_propagated(&self) -> PropagatedContext {
        match &self.span_context {
            Some(ctx) if ctx.is_valid() => PropagatedContext {
                trace_id: ctx.trace_id().to_string(),
                span_id: ctx.span_id().to_string(),
                trace_flags: ctx.trace_flags().to_u8(),
            },
            _ => PropagatedContext::empty(),
        }
    }

    /// Create a span for `operation` whose parent is this context.
    pub fn child_span(&self, service: &str, operation: &str) -> tracing::Span {
        match &self.span_context {
            Some(ctx) if ctx.is_valid() => {
                let span = tracing::info_span!(
                    "service_operation",
                    remote_trace_id = %ctx.trace_id(),
                    service = %service,
                    operation = %operation,
                );
                span.set_parent(Context::new().with_remote_span_context(ctx.clone()));
                span
            }
            _ => tracing::info_span!(
                "service_operation",
                service = %service,
                operation = %operation,
            ),
        }
    }

    /// Hex trace id, when valid.
    pub fn trace_id(&self) -> Option<String> {
        self.span_context
            .as_ref()
            .filter(|c| c.is_valid())
            .map(|c| c.trace_id().to_string())
    }

    /// Check if this context has a valid trace.
    pub fn is_valid(&self) -> bool {
        self.span_context
            .as_ref()
            .map(|c| c.is_valid())
            .unwrap_or(false)
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Injects and extracts trace context carried by outbound/inbound messages.
///
/// Publishers, REST and RPC clients call [`TracePropagator::inject`] on the
/// way out; responders call [`TracePropagator::continue_trace`] on the way in.
pub trait TracePropagator: Send + Sync {
    /// Serialize the active trace context. Empty when there is none.
    fn inject(&self) -> Vec<u8>;

    /// Open a span for `operation` continuing the trace in `carrier`.
    fn continue_trace(&self, carrier: &[u8], service: &str, operation: &str) -> tracing::Span;
}

/// Propagates OpenTelemetry span contexts as JSON-encoded [`PropagatedContext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OtelPropagator;

impl TracePropagator for OtelPropagator {
    fn inject(&self) -> Vec<u8> {
        TraceContext::extract_current().to_propagated().to_bytes()
    }

    fn continue_trace(&self, carrier: &[u8], service: &str, operation: &str) -> tracing::Span {
        PropagatedContext::from_bytes(carrier)
            .to_context()
            .child_span(service, operation)
    }
}

/// Propagator that carries nothing. Used in tests and tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPropagator;

impl TracePropagator for NoopPropagator {
    fn inject(&self) -> Vec<u8> {
        Vec::new()
    }

    fn continue_trace(&self, _carrier: &[u8], service: &str, operation: &str) -> tracing::Span {
        TraceContext::new().child_span(service, operation)
    }
}
