use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{AuthApi, DevToolsApi};
use crate::error::ApiError;
use crate::types::{LoginResponse, RegisterRequest, UserInfo};

/// In-memory stand-in for the console backend
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
    verify_calls: Arc<AtomicUsize>,
}

#[derive(Debug)]
struct FakeState {
    offline: bool,
    role: String,
    has_password: bool,
    devtools_password: String,
    verify_delay: Option<Duration>,
    issued: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            offline: false,
            role: "ADMIN".to_string(),
            has_password: true,
            devtools_password: FakeBackend::DEVTOOLS_PASSWORD.to_string(),
            verify_delay: None,
            issued: 0,
        }
    }
}

impl FakeBackend {
    pub const USER_PASSWORD: &'static str = "admin123";
    pub const DEVTOOLS_PASSWORD: &'static str = "open-sesame";

    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails as if the backend were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.with_state(|s| s.offline = offline);
    }

    pub fn set_role(&self, role: &str) {
        self.with_state(|s| s.role = role.to_string());
    }

    pub fn set_has_password(&self, has_password: bool) {
        self.with_state(|s| s.has_password = has_password);
    }

    pub fn set_verify_delay(&self, delay: Duration) {
        self.with_state(|s| s.verify_delay = Some(delay));
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    fn reachable(&self) -> Result<(), ApiError> {
        if self.with_state(|s| s.offline) {
            Err(ApiError::transport("connection refused"))
        } else {
            Ok(())
        }
    }

    fn user(&self, username: &str) -> UserInfo {
        UserInfo {
            id: Some(1),
            username: Some(username.to_string()),
            email: Some(format!("{}@example.com", username)),
            role: Some(self.with_state(|s| s.role.clone())),
        }
    }
}

#[async_trait]
impl AuthApi for FakeBackend {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.reachable()?;
        if password != Self::USER_PASSWORD {
            return Err(ApiError::rejected(401, "invalid username or password"));
        }
        let issued = self.with_state(|s| {
            s.issued += 1;
            s.issued
        });
        Ok(LoginResponse {
            token: format!("token-{}", issued),
            user_info: self.user(username),
        })
    }

    async fn register(&self, request: &RegisterRequest) -> Result<Value, ApiError> {
        self.reachable()?;
        Ok(json!({ "username": request.username }))
    }

    async fn logout(&self, _token: &str) -> Result<(), ApiError> {
        self.reachable()
    }

    async fn user_info(&self, token: &str) -> Result<UserInfo, ApiError> {
        self.reachable()?;
        if token.is_empty() {
            return Err(ApiError::rejected(401, "not logged in"));
        }
        Ok(self.user("admin"))
    }
}

#[async_trait]
impl DevToolsApi for FakeBackend {
    async fn password_status(&self) -> Result<bool, ApiError> {
        self.reachable()?;
        Ok(self.with_state(|s| s.has_password))
    }

    async fn verify_password(&self, password: &str) -> Result<bool, ApiError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.with_state(|s| s.verify_delay) {
            tokio::time::sleep(delay).await;
        }
        self.reachable()?;
        Ok(self.with_state(|s| s.has_password && s.devtools_password == password))
    }

    async fn set_password(&self, token: &str, password: &str) -> Result<(), ApiError> {
        self.reachable()?;
        if token.is_empty() {
            return Err(ApiError::rejected(401, "not logged in"));
        }
        self.with_state(|s| {
            s.devtools_password = password.to_string();
            s.has_password = true;
        });
        Ok(())
    }
}
