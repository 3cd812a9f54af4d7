//! # Trace Propagation
//!
//! A call over the broker keeps one distributed trace: the caller's trace
//! context rides in the envelope and the responder's span continues it.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::Harness;
    use opentelemetry_sdk::trace::TracerProvider;
    use rw_dispatch::{HandlerError, HandlerTable};
    use rw_telemetry::{trace_layer, NoopPropagator, OtelPropagator, TraceContext};
    use shared_types::dto::{GetUserByUsernameRequest, UserMessage};
    use shared_types::operations::GetUserByUsername;
    use shared_types::{ServiceName, Transport};
    use std::sync::Arc;
    use tracing::Instrument;
    use tracing_subscriber::layer::SubscriberExt;

    /// Users table answering with the trace id its handler runs under.
    fn trace_echo_table() -> HandlerTable {
        let mut table = HandlerTable::new(ServiceName::Users);
        table
            .register::<GetUserByUsername, _, _>(|req: GetUserByUsernameRequest| async move {
                Ok::<_, HandlerError>(UserMessage {
                    id: TraceContext::extract_current().trace_id().unwrap_or_default(),
                    username: req.username,
                })
            })
            .unwrap();
        table
    }

    fn request() -> GetUserByUsernameRequest {
        GetUserByUsernameRequest {
            username: "alice".into(),
        }
    }

    // Current-thread runtime: every task is polled on the thread holding
    // the default subscriber.
    #[tokio::test(flavor = "current_thread")]
    async fn test_responder_continues_caller_trace() {
        let provider = TracerProvider::builder().build();
        let subscriber = tracing_subscriber::registry().with(trace_layer(&provider, "rw-tests"));
        let _default = tracing::subscriber::set_default(subscriber);

        let mut harness = Harness::with_propagator(Arc::new(OtelPropagator)).await;
        harness.serve(trace_echo_table()).await;

        let caller = tracing::info_span!("gateway_request");
        let caller_trace = caller
            .in_scope(|| TraceContext::extract_current().trace_id())
            .expect("caller span has a trace id");

        let echoed = harness
            .invoker
            .invoke::<GetUserByUsername>(Transport::Events, &request())
            .instrument(caller)
            .await
            .unwrap();

        assert_eq!(echoed.id, caller_trace);
        harness.stop().await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_without_propagation_traces_are_unrelated() {
        let provider = TracerProvider::builder().build();
        let subscriber = tracing_subscriber::registry().with(trace_layer(&provider, "rw-tests"));
        let _default = tracing::subscriber::set_default(subscriber);

        let mut harness = Harness::with_propagator(Arc::new(NoopPropagator)).await;
        harness.serve(trace_echo_table()).await;

        let caller = tracing::info_span!("gateway_request");
        let caller_trace = caller.in_scope(|| TraceContext::extract_current().trace_id());

        let echoed = harness
            .invoker
            .invoke::<GetUserByUsername>(Transport::Events, &request())
            .instrument(caller)
            .await
            .unwrap();

        assert!(caller_trace.is_some());
        assert!(!echoed.id.is_empty());
        assert_ne!(Some(echoed.id), caller_trace);
        harness.stop().await;
    }
}
