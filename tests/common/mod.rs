#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use upload_console::api::ApiClient;

pub const ADMIN_PASSWORD: &str = "admin123";
pub const DEVTOOLS_PASSWORD: &str = "let-me-debug";

static TRACING: Once = Once::new();

/// Route crate logs through the test writer; `RUST_LOG=upload_console=debug` shows them
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

type Shared = Arc<Mutex<MockState>>;
type Reply = (StatusCode, Json<Value>);

#[derive(Debug)]
struct Account {
    password: String,
    email: String,
    role: String,
}

#[derive(Debug, Default)]
struct MockState {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, String>,
    issued: u64,
    devtools_password: Option<String>,
    logout_fails: bool,
    verify_calls: usize,
}

/// In-process console backend speaking the `{code, message, data}` envelope
pub struct MockBackend {
    pub port: u16,
    pub base_url: String,
    state: Shared,
}

impl MockBackend {
    /// Seeds `admin` (ADMIN) and `root` (SUPER_ADMIN), both with
    /// [`ADMIN_PASSWORD`], and a configured devtools password.
    pub async fn spawn() -> Result<Self> {
        init_tracing();
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut state = MockState {
            devtools_password: Some(DEVTOOLS_PASSWORD.to_string()),
            ..Default::default()
        };
        for (name, role) in [("admin", "ADMIN"), ("root", "SUPER_ADMIN")] {
            state.accounts.insert(
                name.to_string(),
                Account {
                    password: ADMIN_PASSWORD.to_string(),
                    email: format!("{}@example.com", name),
                    role: role.to_string(),
                },
            );
        }
        let state = Arc::new(Mutex::new(state));

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind mock backend on {}", port))?;
        let app = router(state.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("mock backend stopped: {}", e);
            }
        });
        tracing::debug!("mock backend listening on {}", base_url);

        Ok(Self { port, base_url, state })
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.base_url, Duration::from_secs(5)).expect("valid mock base url")
    }

    pub fn set_logout_fails(&self, fails: bool) {
        self.state.lock().unwrap().logout_fails = fails;
    }

    pub fn set_devtools_password(&self, password: Option<&str>) {
        self.state.lock().unwrap().devtools_password = password.map(str::to_string);
    }

    pub fn verify_calls(&self) -> usize {
        self.state.lock().unwrap().verify_calls
    }

    pub fn active_tokens(&self) -> usize {
        self.state.lock().unwrap().tokens.len()
    }
}

/// A client pointed at a port nothing listens on
pub fn unreachable_client() -> Result<ApiClient> {
    init_tracing();
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    Ok(ApiClient::new(&format!("http://127.0.0.1:{}", port), Duration::from_secs(2))?)
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/userinfo", get(userinfo))
        .route("/api/dev-tools/password/status", get(password_status))
        .route("/api/dev-tools/password/verify", post(verify_password))
        .route("/api/dev-tools/password", post(set_password))
        .with_state(state)
}

fn ok(data: Value) -> Reply {
    (StatusCode::OK, Json(json!({ "code": 200, "message": "success", "data": data })))
}

fn rejected(code: i64, message: &str) -> Reply {
    (StatusCode::OK, Json(json!({ "code": code, "message": message, "data": null })))
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn user_json(name: &str, account: &Account) -> Value {
    json!({ "id": 1, "username": name, "email": account.email, "role": account.role })
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let mut state = state.lock().unwrap();
    let user = match state.accounts.get(username) {
        Some(account) if account.password == password => user_json(username, account),
        _ => return rejected(401, "invalid username or password"),
    };

    state.issued += 1;
    let token = format!("mock-token-{}", state.issued);
    state.tokens.insert(token.clone(), username.to_string());
    ok(json!({ "token": token, "userInfo": user }))
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let username = body["username"].as_str().unwrap_or_default().to_string();
    let mut state = state.lock().unwrap();
    if username.is_empty() || state.accounts.contains_key(&username) {
        return rejected(409, "username already taken");
    }

    state.accounts.insert(
        username.clone(),
        Account {
            password: body["password"].as_str().unwrap_or_default().to_string(),
            email: body["email"].as_str().unwrap_or_default().to_string(),
            role: "USER".to_string(),
        },
    );
    ok(json!({ "username": username }))
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut state = state.lock().unwrap();
    if state.logout_fails {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "code": 500, "message": "logout exploded", "data": null })),
        );
    }
    if let Some(token) = bearer(&headers) {
        state.tokens.remove(&token);
    }
    ok(Value::Null)
}

async fn userinfo(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let state = state.lock().unwrap();
    let found = bearer(&headers)
        .and_then(|token| state.tokens.get(&token).cloned())
        .and_then(|name| state.accounts.get(&name).map(|account| user_json(&name, account)));

    match found {
        Some(user) => ok(user),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "code": 401, "message": "token expired", "data": null })),
        ),
    }
}

async fn password_status(State(state): State<Shared>) -> Reply {
    let has_password = state.lock().unwrap().devtools_password.is_some();
    ok(json!({ "hasPassword": has_password }))
}

async fn verify_password(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let mut state = state.lock().unwrap();
    state.verify_calls += 1;
    let valid = match (state.devtools_password.as_deref(), body["password"].as_str()) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    };
    ok(json!({ "valid": valid }))
}

async fn set_password(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut state = state.lock().unwrap();
    let authorized = bearer(&headers).is_some_and(|token| state.tokens.contains_key(&token));
    if !authorized {
        return rejected(401, "login required");
    }
    state.devtools_password = body["password"].as_str().map(str::to_string);
    ok(Value::Null)
}
