//! # Service Names
//!
//! The backend services that own operations.

use crate::errors::ServiceParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A backend service that owns a set of operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceName {
    Auth,
    Users,
    Pictures,
    Analytics,
}

impl ServiceName {
    /// All services.
    pub const ALL: [ServiceName; 4] = [
        ServiceName::Auth,
        ServiceName::Users,
        ServiceName::Pictures,
        ServiceName::Analytics,
    ];

    /// Name used in configuration and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Auth => "auth",
            ServiceName::Users => "users",
            ServiceName::Pictures => "pictures",
            ServiceName::Analytics => "analytics",
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceName {
    type Err = ServiceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceName::ALL
            .into_iter()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| ServiceParseError(s.to_string()))
    }
}
