//! # Operation Catalogue
//!
//! Every operation the services expose, as a closed enum plus one
//! zero-sized type per operation binding its request and response types.
//!
//! ```text
//! OperationId::GetUserByUsername
//!     service    = users
//!     name       = "getUserByUsername"          (directory key)
//!     event key  = "users:get_data_by_username" (broker envelope key)
//!     Request    = GetUserByUsernameRequest
//!     Response   = UserMessage
//! ```
//!
//! Unknown operation names and event keys are rejected when they are parsed
//! into an `OperationId`, so dispatch code only ever handles known variants.

use crate::dto::*;
use crate::errors::OperationParseError;
use crate::services::ServiceName;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A strongly typed operation.
///
/// Implemented by the zero-sized marker types generated below; callers use
/// them as type parameters (`invoker.invoke::<GetUserByUsername>(..)`).
pub trait Operation: Send + Sync + 'static {
    /// Catalogue entry of this operation.
    const ID: OperationId;
    /// Request payload.
    type Request: Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Response payload.
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

macro_rules! operations {
    ($(
        $(#[$meta:meta])*
        $op:ident => $service:ident, $name:literal, $event:literal, $req:ty, $resp:ty;
    )*) => {
        /// Identifier of every known operation.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum OperationId {
            $($(#[$meta])* $op,)*
        }

        impl OperationId {
            /// The whole catalogue.
            pub const ALL: &'static [OperationId] = &[$(OperationId::$op,)*];

            /// Service that owns the operation.
            #[must_use]
            pub const fn service(&self) -> ServiceName {
                match self {
                    $(OperationId::$op => ServiceName::$service,)*
                }
            }

            /// Operation name as used in the service directory.
            #[must_use]
            pub const fn name(&self) -> &'static str {
                match self {
                    $(OperationId::$op => $name,)*
                }
            }

            /// Default broker envelope key of the request.
            #[must_use]
            pub const fn event_key(&self) -> &'static str {
                match self {
                    $(OperationId::$op => $event,)*
                }
            }
        }

        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $op;

            impl Operation for $op {
                const ID: OperationId = OperationId::$op;
                type Request = $req;
                type Response = $resp;
            }
        )*
    };
}

operations! {
    /// Fetch a user by id.
    GetUserData => Users, "getUserData", "users:get_data", GetUserDataRequest, UserMessage;
    /// Fetch a user by username.
    GetUserByUsername => Users, "getUserByUsername", "users:get_data_by_username", GetUserByUsernameRequest, UserMessage;
    /// Check a username/password pair.
    ValidatePassword => Users, "validatePassword", "users:validate_password", ValidatePasswordRequest, Empty;
    CreateUser => Users, "createUser", "users:create", CreateUserRequest, UserMessage;
    DeleteUser => Users, "deleteUser", "users:delete", DeleteUserRequest, Empty;

    Login => Auth, "login", "auth:login", Credentials, LoginResponse;
    Signup => Auth, "signup", "auth:signup", Credentials, LoginResponse;
    /// Authorise a privileged call before it is dispatched.
    ValidateRequestOp => Auth, "validateRequest", "auth:validate_request", ValidateRequest, ValidationResponse;

    GetUserPictures => Pictures, "getUserPictures", "pictures:get_user_pictures", GetUserPicturesRequest, PicturesMessage;
    GetUserPicture => Pictures, "getUserPicture", "pictures:get_user_picture", GetUserPictureRequest, PictureMessage;
    CreateUserPicture => Pictures, "createUserPicture", "pictures:create_user_picture", CreateUserPictureRequest, PictureMessage;
    DeleteUserPicture => Pictures, "deleteUserPicture", "pictures:delete_user_picture", DeleteUserPictureRequest, Empty;

    LogData => Analytics, "logData", "analytics:log_data", LogDataRequest, Empty;
    GetLogs => Analytics, "getLogs", "analytics:get_logs", GetLogsRequest, AnalyticsEntries;
}

impl OperationId {
    /// Resolve an operation from its service and directory name.
    pub fn find(service: ServiceName, name: &str) -> Result<Self, OperationParseError> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.service() == service && op.name() == name)
            .ok_or_else(|| OperationParseError::UnknownOperation {
                service: service.to_string(),
                operation: name.to_string(),
            })
    }

    /// Resolve an operation from its default event key.
    pub fn from_event_key(key: &str) -> Result<Self, OperationParseError> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.event_key() == key)
            .ok_or_else(|| OperationParseError::UnknownEventKey(key.to_string()))
    }

    /// Operations owned by `service`.
    pub fn for_service(service: ServiceName) -> impl Iterator<Item = OperationId> {
        Self::ALL
            .iter()
            .copied()
            .filter(move |op| op.service() == service)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service(), self.name())
    }
}
