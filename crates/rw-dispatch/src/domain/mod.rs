//! Domain layer: correlation, directory, configuration and errors.

pub mod config;
pub mod correlation;
pub mod directory;
pub mod error;
pub mod pending;

pub use config::DispatchConfig;
pub use correlation::CorrelationId;
pub use directory::{
    HttpMethod, OperationDescriptor, OperationRoutes, RestRoute, ServiceDirectory,
    TransportAddress,
};
pub use error::{ConfigError, DirectoryError, DispatchError, HandlerError, TableError};
pub use pending::{CorrelationRegistry, PendingStats, PendingStatsSnapshot, WaitHandle};
