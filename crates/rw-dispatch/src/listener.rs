//! Response listener: feeds the results topic into the correlation registry.

use crate::domain::pending::CorrelationRegistry;
use async_trait::async_trait;
use shared_bus::{Envelope, MessageHandler};
use tracing::debug;

/// Resolves pending calls from response envelopes.
///
/// Several processes share one results topic, so most responses seen here
/// belong to someone else; the registry drops them as unknown.
#[derive(Clone)]
pub struct ResponseCollector {
    registry: CorrelationRegistry,
}

impl ResponseCollector {
    pub fn new(registry: CorrelationRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl MessageHandler for ResponseCollector {
    async fn handle(&self, envelope: Envelope) {
        if !envelope.is_response() {
            debug!(key = %envelope.key, "Ignoring non-response envelope on results topic");
            return;
        }
        let correlation_id = envelope.correlation_id.clone();
        if !self.registry.resolve(&correlation_id, envelope) {
            debug!(correlation_id = %correlation_id, "Response for unknown or expired correlation id");
        }
    }
}
