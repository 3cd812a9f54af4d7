//! Per-service RPC client routing.

use crate::ports::outbound::RpcClient;
use shared_types::ServiceName;
use std::collections::HashMap;
use std::sync::Arc;

/// The RPC stub of each downstream service.
#[derive(Clone, Default)]
pub struct RpcClientSet {
    clients: HashMap<ServiceName, Arc<dyn RpcClient>>,
}

impl RpcClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the stub for `service`, replacing any previous one.
    #[must_use]
    pub fn with(mut self, service: ServiceName, client: Arc<dyn RpcClient>) -> Self {
        self.insert(service, client);
        self
    }

    pub fn insert(&mut self, service: ServiceName, client: Arc<dyn RpcClient>) {
        self.clients.insert(service, client);
    }

    pub fn get(&self, service: ServiceName) -> Option<&Arc<dyn RpcClient>> {
        self.clients.get(&service)
    }

    pub fn services(&self) -> impl Iterator<Item = ServiceName> + '_ {
        self.clients.keys().copied()
    }
}

impl std::fmt::Debug for RpcClientSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClientSet")
            .field("services", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}
