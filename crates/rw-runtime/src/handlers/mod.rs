//! Operation handlers of the services this process can host.

pub mod auth;
pub mod users;

pub use auth::{auth_table, AuthService};
pub use users::{users_table, UserStore};
