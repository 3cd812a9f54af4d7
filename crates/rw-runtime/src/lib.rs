//! # Realworld Runtime Library
//!
//! Exposes the internal modules of the service process for testing.
//! The main entry point is the `main.rs` binary.
//!
//! ## Modules
//!
//! - `config/` - Environment-driven runtime configuration
//! - `handlers/` - Operation handlers of the users and auth services
//! - `runtime/` - Broker, listener and responder wiring with graceful shutdown

#![allow(clippy::type_complexity)]

pub mod config;
pub mod handlers;
pub mod runtime;

pub use config::RuntimeConfig;
pub use handlers::{auth_table, users_table, AuthService, UserStore};
pub use runtime::ServiceRuntime;
