//! # Users Handlers
//!
//! In-memory account store served over the broker. Stands in for the users
//! service's database so the bridge can be run end to end.

use parking_lot::RwLock;
use rw_dispatch::{HandlerError, HandlerTable, TableError};
use sha2::{Digest, Sha256};
use shared_types::dto::{
    CreateUserRequest, DeleteUserRequest, Empty, GetUserByUsernameRequest, GetUserDataRequest,
    UserMessage, ValidatePasswordRequest,
};
use shared_types::operations::{
    CreateUser, DeleteUser, GetUserByUsername, GetUserData, ValidatePassword,
};
use shared_types::ServiceName;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct UserRecord {
    id: String,
    username: String,
    salt: String,
    password_hash: String,
}

impl UserRecord {
    fn message(&self) -> UserMessage {
        UserMessage {
            id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Accounts keyed by id.
#[derive(Debug, Default)]
pub struct UserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, username: &str, password: &str) -> Result<UserMessage, HandlerError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(HandlerError::InvalidRequest(
                "username and password are required".into(),
            ));
        }
        let mut users = self.users.write();
        if users.values().any(|u| u.username == username) {
            return Err(HandlerError::Conflict(format!("username {username} is taken")));
        }
        let salt = Uuid::new_v4().simple().to_string();
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: hash_password(&salt, password),
            salt,
        };
        let message = record.message();
        users.insert(record.id.clone(), record);
        Ok(message)
    }

    pub fn get(&self, id: &str) -> Result<UserMessage, HandlerError> {
        self.users
            .read()
            .get(id)
            .map(UserRecord::message)
            .ok_or_else(|| HandlerError::NotFound(format!("user {id}")))
    }

    pub fn get_by_username(&self, username: &str) -> Result<UserMessage, HandlerError> {
        self.users
            .read()
            .values()
            .find(|u| u.username == username)
            .map(UserRecord::message)
            .ok_or_else(|| HandlerError::NotFound(format!("user {username}")))
    }

    pub fn validate_password(&self, username: &str, password: &str) -> Result<(), HandlerError> {
        let users = self.users.read();
        let valid = users
            .values()
            .find(|u| u.username == username)
            .map(|u| u.password_hash == hash_password(&u.salt, password))
            .unwrap_or(false);
        if valid {
            Ok(())
        } else {
            Err(HandlerError::Unauthorized("invalid username or password".into()))
        }
    }

    pub fn delete(&self, id: &str) -> Result<(), HandlerError> {
        self.users
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| HandlerError::NotFound(format!("user {id}")))
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handler table of the users service.
pub fn users_table(store: Arc<UserStore>) -> Result<HandlerTable, TableError> {
    let mut table = HandlerTable::new(ServiceName::Users);

    let s = store.clone();
    table.register::<GetUserData, _, _>(move |req: GetUserDataRequest| {
        let result = s.get(&req.user_id);
        async move { result }
    })?;

    let s = store.clone();
    table.register::<GetUserByUsername, _, _>(move |req: GetUserByUsernameRequest| {
        let result = s.get_by_username(&req.username);
        async move { result }
    })?;

    let s = store.clone();
    table.register::<ValidatePassword, _, _>(move |req: ValidatePasswordRequest| {
        let result = s.validate_password(&req.username, &req.password).map(|()| Empty {});
        async move { result }
    })?;

    let s = store.clone();
    table.register::<CreateUser, _, _>(move |req: CreateUserRequest| {
        let result = s.create(&req.username, &req.password);
        async move { result }
    })?;

    let s = store;
    table.register::<DeleteUser, _, _>(move |req: DeleteUserRequest| {
        let result = s.delete(&req.user_id).map(|()| Empty {});
        async move { result }
    })?;

    table.ensure_complete()?;
    Ok(table)
}
