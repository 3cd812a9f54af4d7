//! Service-Operation Directory.
//!
//! Static map from (service, operation) to the address of that operation on
//! each transport, loaded once from TOML at startup:
//!
//! ```toml
//! [services.users]
//! rest_base_url = "http://users:8080"
//! topic = "users"
//!
//! [services.users.operations.getUserByUsername]
//! rest = { method = "GET", path = "/users/by-username" }
//! rpc = "GetUserDataByUsername"
//! event = "users:get_data_by_username"
//! ```
//!
//! Service and operation names are checked against the catalogue while
//! loading, so an unknown name fails startup rather than a call. Event
//! names are free-form but must be unique within a service and must not
//! collide with the response keys.

use crate::domain::error::{DirectoryError, DispatchError};
use serde::{Deserialize, Serialize};
use shared_bus::{ERROR_RESPONSE_KEY, RESPONSE_KEY};
use shared_types::{OperationId, ServiceName, Transport};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use tracing::info;

/// HTTP verb of a REST route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Whether the request travels in the query string rather than a body.
    pub fn uses_query(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestRoute {
    pub method: HttpMethod,
    pub path: String,
}

/// Per-transport addressing of one operation. A missing field means the
/// operation is not reachable over that transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationRoutes {
    #[serde(default)]
    pub rest: Option<RestRoute>,
    #[serde(default)]
    pub rpc: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
}

/// Resolved address of one operation on one transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAddress {
    Rest { url: String, method: HttpMethod },
    Rpc { service: ServiceName, method: String },
    Events { topic: String, event: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ServiceEntry {
    rest_base_url: Option<String>,
    topic: String,
    operations: HashMap<OperationId, OperationRoutes>,
}

/// One operation's directory entry.
#[derive(Debug, Clone, Copy)]
pub struct OperationDescriptor<'a> {
    pub operation: OperationId,
    service: &'a ServiceEntry,
    routes: &'a OperationRoutes,
}

impl<'a> OperationDescriptor<'a> {
    pub fn routes(&self) -> &'a OperationRoutes {
        self.routes
    }

    /// Topic the service consumes requests from.
    pub fn topic(&self) -> &'a str {
        &self.service.topic
    }

    /// Address on `transport`, if the operation is reachable over it.
    pub fn address(&self, transport: Transport) -> Option<TransportAddress> {
        match transport {
            Transport::Rest => {
                let route = self.routes.rest.as_ref()?;
                let base = self.service.rest_base_url.as_deref()?;
                Some(TransportAddress::Rest {
                    url: join_url(base, &route.path),
                    method: route.method,
                })
            }
            Transport::Rpc => self.routes.rpc.as_ref().map(|method| TransportAddress::Rpc {
                service: self.operation.service(),
                method: method.clone(),
            }),
            Transport::Events => self.routes.event.as_ref().map(|event| TransportAddress::Events {
                topic: self.service.topic.clone(),
                event: event.clone(),
            }),
        }
    }

    /// Like [`OperationDescriptor::address`], failing with `NoRoute`.
    pub fn require(&self, transport: Transport) -> Result<TransportAddress, DispatchError> {
        self.address(transport).ok_or(DispatchError::NoRoute {
            transport,
            operation: self.operation,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawDirectory {
    #[serde(default)]
    services: BTreeMap<String, RawService>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawService {
    #[serde(default)]
    rest_base_url: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    operations: BTreeMap<String, OperationRoutes>,
}

/// Read-only directory of every configured service and operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDirectory {
    services: HashMap<ServiceName, ServiceEntry>,
}

impl ServiceDirectory {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DirectoryError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let directory = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            services = directory.services.len(),
            operations = directory.operation_count(),
            "Loaded service directory"
        );
        Ok(directory)
    }

    /// Parse TOML directory text.
    pub fn from_toml_str(content: &str) -> Result<Self, DirectoryError> {
        let raw: RawDirectory =
            toml::from_str(content).map_err(|e| DirectoryError::Parse(e.to_string()))?;

        let mut services = HashMap::with_capacity(raw.services.len());
        for (name, raw_service) in raw.services {
            let service: ServiceName = name
                .parse()
                .map_err(|_| DirectoryError::UnknownService(name.clone()))?;

            let mut operations = HashMap::with_capacity(raw_service.operations.len());
            let mut events: HashMap<String, OperationId> = HashMap::new();
            for (op_name, routes) in raw_service.operations {
                let operation = OperationId::find(service, &op_name).map_err(|_| {
                    DirectoryError::UnknownOperation {
                        service: name.clone(),
                        operation: op_name.clone(),
                    }
                })?;
                if let Some(event) = &routes.event {
                    if event == RESPONSE_KEY || event == ERROR_RESPONSE_KEY {
                        return Err(DirectoryError::ReservedEvent {
                            operation,
                            event: event.clone(),
                        });
                    }
                    if let Some(first) = events.insert(event.clone(), operation) {
                        return Err(DirectoryError::DuplicateEvent {
                            event: event.clone(),
                            first,
                            second: operation,
                        });
                    }
                }
                operations.insert(operation, routes);
            }

            let topic = raw_service
                .topic
                .unwrap_or_else(|| service.as_str().to_string());
            services.insert(
                service,
                ServiceEntry {
                    rest_base_url: raw_service.rest_base_url,
                    topic,
                    operations,
                },
            );
        }

        Ok(Self { services })
    }

    /// Look up an operation by service and operation name.
    pub fn lookup(
        &self,
        service: &str,
        operation: &str,
    ) -> Result<OperationDescriptor<'_>, DirectoryError> {
        let service_name: ServiceName = service
            .parse()
            .map_err(|_| DirectoryError::UnknownService(service.to_string()))?;
        let operation_id = OperationId::find(service_name, operation).map_err(|_| {
            DirectoryError::UnknownOperation {
                service: service.to_string(),
                operation: operation.to_string(),
            }
        })?;
        self.descriptor(operation_id)
    }

    /// Directory entry of a catalogue operation.
    pub fn descriptor(&self, operation: OperationId) -> Result<OperationDescriptor<'_>, DirectoryError> {
        let not_configured = || DirectoryError::UnknownOperation {
            service: operation.service().to_string(),
            operation: operation.name().to_string(),
        };
        let service = self
            .services
            .get(&operation.service())
            .ok_or_else(not_configured)?;
        let routes = service.operations.get(&operation).ok_or_else(not_configured)?;
        Ok(OperationDescriptor {
            operation,
            service,
            routes,
        })
    }

    /// Topic `service` consumes requests from.
    pub fn topic_of(&self, service: ServiceName) -> Option<&str> {
        self.services.get(&service).map(|s| s.topic.as_str())
    }

    /// Event name to operation map of `service`, used by its responder to
    /// resolve incoming request keys.
    pub fn event_routes(&self, service: ServiceName) -> HashMap<String, OperationId> {
        self.services
            .get(&service)
            .map(|entry| {
                entry
                    .operations
                    .iter()
                    .filter_map(|(op, routes)| routes.event.clone().map(|event| (event, *op)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fail if any of `operations` has no entry.
    pub fn ensure_covers(&self, operations: &[OperationId]) -> Result<(), DirectoryError> {
        let missing: Vec<OperationId> = operations
            .iter()
            .copied()
            .filter(|op| self.descriptor(*op).is_err())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DirectoryError::Incomplete(missing))
        }
    }

    pub fn operation_count(&self) -> usize {
        self.services.values().map(|s| s.operations.len()).sum()
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
