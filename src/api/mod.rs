//! Client for the console backend.
//!
//! Every endpoint answers with the envelope `{code, message, data}` where
//! `code == 200` means success. [`ApiClient`] implements the two backend
//! collaborator traits, [`AuthApi`] and [`DevToolsApi`]; the session store,
//! the renderer gate and the host guard only ever see the traits.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::types::{LoginResponse, RegisterRequest, UserInfo};

/// Standard backend response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<Option<T>, ApiError> {
        if self.code == 200 {
            Ok(self.data)
        } else {
            Err(ApiError::rejected(
                self.code,
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError>;
    async fn register(&self, request: &RegisterRequest) -> Result<Value, ApiError>;
    async fn logout(&self, token: &str) -> Result<(), ApiError>;
    async fn user_info(&self, token: &str) -> Result<UserInfo, ApiError>;
}

#[async_trait]
pub trait DevToolsApi: Send + Sync {
    /// `GET /dev-tools/password/status`
    async fn password_status(&self) -> Result<bool, ApiError>;
    /// `POST /dev-tools/password/verify`; `Ok(false)` is a wrong password
    async fn verify_password(&self, password: &str) -> Result<bool, ApiError>;
    /// `POST /dev-tools/password`
    async fn set_password(&self, token: &str, password: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordStatus {
    #[serde(default)]
    has_password: bool,
}

#[derive(Debug, Deserialize)]
struct PasswordVerdict {
    #[serde(default)]
    valid: bool,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(&format!("{}/api/", base_url.trim_end_matches('/')))
            .map_err(|e| {
                ApiError::transport(format!("invalid API base URL '{}': {}", base_url, e))
            })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::transport(e.to_string()))?;

        Ok(Self { http, base })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        Self::new(&config.api.base_url, Duration::from_secs(config.api.timeout_secs))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::transport(format!("invalid endpoint '{}': {}", path, e)))?;

        let mut builder = self.http.request(method, url);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Envelope<Value>>(&body)
                .ok()
                .and_then(|env| env.message)
                .unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                });
            return Err(ApiError::http(status.as_u16(), message));
        }

        let envelope: Envelope<Value> = response.json().await?;
        match envelope.into_result()? {
            Some(Value::Null) | None => Ok(None),
            Some(data) => Ok(Some(serde_json::from_value(data)?)),
        }
    }

    async fn send_required<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, ApiError> {
        self.send(builder)
            .await?
            .ok_or_else(|| ApiError::decode(format!("{} response has no data", what)))
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let builder = self
            .request(Method::POST, "/auth/login", None)?
            .json(&json!({ "username": username, "password": password }));
        self.send_required(builder, "login").await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<Value, ApiError> {
        let builder = self.request(Method::POST, "/auth/register", None)?.json(request);
        Ok(self.send::<Value>(builder).await?.unwrap_or(Value::Null))
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, "/auth/logout", Some(token))?;
        self.send::<Value>(builder).await.map(|_| ())
    }

    async fn user_info(&self, token: &str) -> Result<UserInfo, ApiError> {
        let builder = self.request(Method::GET, "/auth/userinfo", Some(token))?;
        self.send_required(builder, "userinfo").await
    }
}

#[async_trait]
impl DevToolsApi for ApiClient {
    async fn password_status(&self) -> Result<bool, ApiError> {
        let builder = self.request(Method::GET, "/dev-tools/password/status", None)?;
        let status: Option<PasswordStatus> = self.send(builder).await?;
        Ok(status.map(|s| s.has_password).unwrap_or(false))
    }

    async fn verify_password(&self, password: &str) -> Result<bool, ApiError> {
        let builder = self
            .request(Method::POST, "/dev-tools/password/verify", None)?
            .json(&json!({ "password": password }));
        let verdict: Option<PasswordVerdict> = self.send(builder).await?;
        Ok(verdict.map(|v| v.valid).unwrap_or(false))
    }

    async fn set_password(&self, token: &str, password: &str) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, "/dev-tools/password", Some(token))?
            .json(&json!({ "password": password }));
        self.send::<Value>(builder).await.map(|_| ())
    }
}
