//! # Shared Types Crate
//!
//! Types shared by every service and by the dispatch bridge:
//!
//! - [`Transport`]: REST, RPC or broker events.
//! - [`ServiceName`]: the services that own operations.
//! - [`OperationId`] and the [`Operation`] marker types: the closed
//!   catalogue of operations, each bound to its request/response payloads.
//! - [`dto`]: the payload shapes themselves.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: an operation's name, owning service, event
//!   key and payload types are declared once, in `operations.rs`.
//! - **Transport Neutral**: payloads serialize to the same JSON whichever
//!   transport carries them.

pub mod dto;
pub mod errors;
pub mod operations;
pub mod services;
pub mod transport;

pub use errors::*;
pub use operations::{Operation, OperationId};
pub use services::ServiceName;
pub use transport::Transport;
