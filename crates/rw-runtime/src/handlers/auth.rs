//! # Auth Handlers
//!
//! Login, signup and request validation. Credentials are checked by calling
//! the users service through the [`Invoker`], like any other service would.
//! Tokens are opaque random strings held in memory.

use parking_lot::RwLock;
use rw_dispatch::{DispatchError, HandlerError, HandlerTable, Invoker, TableError};
use shared_types::dto::{
    CreateUserRequest, Credentials, GetUserByUsernameRequest, LoginResponse, ValidatePasswordRequest,
    ValidateRequest, ValidationResponse,
};
use shared_types::operations::{
    CreateUser, GetUserByUsername, Login, Signup, ValidatePassword, ValidateRequestOp,
};
use shared_types::{ServiceName, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Issues and checks access tokens.
pub struct AuthService {
    invoker: Invoker,
    /// Transport used to reach the users service.
    users_transport: Transport,
    tokens: RwLock<HashMap<String, String>>,
}

/// Map a failed downstream call onto the handler error sent back to our caller.
fn downstream(error: DispatchError) -> HandlerError {
    match error {
        DispatchError::Remote {
            error: HandlerError::Unauthorized(_),
            ..
        } => HandlerError::Unauthorized("invalid username or password".into()),
        DispatchError::Remote {
            error: HandlerError::Conflict(message),
            ..
        } => HandlerError::Conflict(message),
        other => HandlerError::Internal(other.to_string()),
    }
}

impl AuthService {
    pub fn new(invoker: Invoker, users_transport: Transport) -> Self {
        Self {
            invoker,
            users_transport,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    fn issue_token(&self, user_id: String) -> LoginResponse {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.write().insert(token.clone(), user_id);
        LoginResponse {
            access_token: token,
        }
    }

    pub async fn login(&self, credentials: Credentials) -> Result<LoginResponse, HandlerError> {
        self.invoker
            .invoke::<ValidatePassword>(
                self.users_transport,
                &ValidatePasswordRequest {
                    username: credentials.username.clone(),
                    password: credentials.password,
                },
            )
            .await
            .map_err(downstream)?;

        let user = self
            .invoker
            .invoke::<GetUserByUsername>(
                self.users_transport,
                &GetUserByUsernameRequest {
                    username: credentials.username,
                },
            )
            .await
            .map_err(downstream)?;

        debug!(user_id = %user.id, "Login succeeded");
        Ok(self.issue_token(user.id))
    }

    pub async fn signup(&self, credentials: Credentials) -> Result<LoginResponse, HandlerError> {
        let user = self
            .invoker
            .invoke::<CreateUser>(
                self.users_transport,
                &CreateUserRequest {
                    username: credentials.username,
                    password: credentials.password,
                },
            )
            .await
            .map_err(downstream)?;

        debug!(user_id = %user.id, "Signup succeeded");
        Ok(self.issue_token(user.id))
    }

    pub fn validate(&self, request: &ValidateRequest) -> Result<ValidationResponse, HandlerError> {
        let user_id = self
            .tokens
            .read()
            .get(&request.access_token)
            .cloned()
            .ok_or_else(|| HandlerError::Unauthorized("invalid access token".into()))?;
        debug!(
            user_id = %user_id,
            transport = %request.transport,
            target = %request.target,
            "Request authorised"
        );
        Ok(ValidationResponse { user_id })
    }
}

/// Handler table of the auth service.
pub fn auth_table(service: Arc<AuthService>) -> Result<HandlerTable, TableError> {
    let mut table = HandlerTable::new(ServiceName::Auth);

    let s = service.clone();
    table.register::<Login, _, _>(move |credentials: Credentials| {
        let s = s.clone();
        async move { s.login(credentials).await }
    })?;

    let s = service.clone();
    table.register::<Signup, _, _>(move |credentials: Credentials| {
        let s = s.clone();
        async move { s.signup(credentials).await }
    })?;

    let s = service;
    table.register::<ValidateRequestOp, _, _>(move |request: ValidateRequest| {
        let result = s.validate(&request);
        async move { result }
    })?;

    table.ensure_complete()?;
    Ok(table)
}
