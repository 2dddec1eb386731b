//! Developer-tools protection shared by the renderer gate and the host guard.

pub mod gate;
pub mod keys;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::api::DevToolsApi;

pub use gate::{DevToolsGate, DevToolsPolicy, GateCommand, GateNotice, GateState, KeyDisposition};
pub use keys::{KeyEvent, TriggerCombo};

/// Identifies one password challenge across the bridge. Results carrying any
/// other id are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(Uuid);

impl ChallengeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChallengeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DevToolsVerificationError {
    #[error("wrong password")]
    WrongPassword,

    #[error("verification failed: {0}")]
    NetworkFailure(String),
}

/// Local checks run before any remote verification is attempted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordInputError {
    #[error("password must not be empty")]
    Empty,

    #[error("password must be at least {min} characters")]
    TooShort { min: usize },
}

pub fn validate_input(value: &str, min_len: usize) -> Result<(), PasswordInputError> {
    if value.is_empty() {
        return Err(PasswordInputError::Empty);
    }
    if value.chars().count() < min_len {
        return Err(PasswordInputError::TooShort { min: min_len });
    }
    Ok(())
}

/// Ask the backend whether `password` is the devtools password.
pub async fn verify_with_backend(
    api: &dyn DevToolsApi,
    password: &str,
) -> Result<(), DevToolsVerificationError> {
    match api.verify_password(password).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(DevToolsVerificationError::WrongPassword),
        Err(e) => {
            tracing::error!("Devtools password verification failed: {}", e);
            Err(e.into())
        }
    }
}
