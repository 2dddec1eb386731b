//! Client-held session: token plus cached profile, persisted durably.

pub mod storage;
pub mod store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::UserInfo;

pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};
pub use store::SessionStore;

/// Storage keys shared with the web console
pub const TOKEN_KEY: &str = "token";
pub const USER_INFO_KEY: &str = "userInfo";
pub const REMEMBERED_USERNAME_KEY: &str = "rememberedUsername";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("session storage error: {0}")]
    Storage(String),
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            AuthError::NetworkFailure(_) => "NETWORK_FAILURE",
            AuthError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

/// Token is opaque; an empty token means no session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserInfo,
}

impl Session {
    pub fn new(token: impl Into<String>, user: UserInfo) -> Self {
        Self { token: token.into(), user }
    }

    pub fn authenticated(&self) -> bool {
        !self.token.is_empty()
    }
}
