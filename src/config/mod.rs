use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::host::TrustMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub devtools: DevToolsConfig,
    pub host: HostConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevToolsConfig {
    pub grace_window_ms: u64,
    pub min_password_len: usize,
    pub host_challenge_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Requested trust mode; `None` derives it from the environment.
    pub trust_mode: Option<TrustMode>,
    /// Global shortcut candidates in priority order.
    pub shortcuts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub config_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. An unset or unrecognised
    /// `APP_ENV` selects the development preset, which still enforces the
    /// password ceremony.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let requested = var("APP_ENV");
        let environment = match requested.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "production" || v == "prod" => Environment::Production,
            Some(v) if v == "staging" || v == "stage" => Environment::Staging,
            Some(v) if v == "development" || v == "dev" => Environment::Development,
            Some(_) => {
                tracing::warn!("Unrecognised APP_ENV {:?}, using development", requested);
                Environment::Development
            }
            None => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(var)
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = var("API_BASE_URL") {
            self.api.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = var("API_TIMEOUT_SECS") {
            self.api.timeout_secs = v.parse().unwrap_or(self.api.timeout_secs);
        }

        if let Some(v) = var("DEVTOOLS_GRACE_WINDOW_MS") {
            self.devtools.grace_window_ms = v.parse().unwrap_or(self.devtools.grace_window_ms);
        }
        if let Some(v) = var("DEVTOOLS_MIN_PASSWORD_LEN") {
            self.devtools.min_password_len = v.parse().unwrap_or(self.devtools.min_password_len);
        }
        if let Some(v) = var("DEVTOOLS_HOST_CHALLENGE_TIMEOUT_SECS") {
            self.devtools.host_challenge_timeout_secs =
                v.parse().unwrap_or(self.devtools.host_challenge_timeout_secs);
        }

        if let Some(v) = var("HOST_TRUST_MODE") {
            match v.parse::<TrustMode>() {
                Ok(mode) => self.host.trust_mode = Some(mode),
                Err(e) => tracing::warn!("Ignoring HOST_TRUST_MODE: {}", e),
            }
        }
        if let Some(v) = var("HOST_SHORTCUTS") {
            let shortcuts: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !shortcuts.is_empty() {
                self.host.shortcuts = shortcuts;
            }
        }

        if let Some(v) = var("CONSOLE_CONFIG_DIR") {
            self.storage.config_dir = Some(PathBuf::from(v));
        }

        self
    }

    fn default_shortcuts() -> Vec<String> {
        vec![
            "CommandOrControl+Shift+D".to_string(),
            "CommandOrControl+Shift+I".to_string(),
            "F12".to_string(),
        ]
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                timeout_secs: 30,
            },
            devtools: DevToolsConfig {
                grace_window_ms: 3000,
                min_password_len: 6,
                host_challenge_timeout_secs: 120,
            },
            host: HostConfig {
                trust_mode: None,
                shortcuts: Self::default_shortcuts(),
            },
            storage: StorageConfig { config_dir: None },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                timeout_secs: 30,
            },
            devtools: DevToolsConfig {
                grace_window_ms: 3000,
                min_password_len: 6,
                host_challenge_timeout_secs: 60,
            },
            host: HostConfig {
                trust_mode: None,
                shortcuts: Self::default_shortcuts(),
            },
            storage: StorageConfig { config_dir: None },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                timeout_secs: 30,
            },
            devtools: DevToolsConfig {
                grace_window_ms: 3000,
                min_password_len: 6,
                host_challenge_timeout_secs: 60,
            },
            host: HostConfig {
                trust_mode: None,
                shortcuts: Self::default_shortcuts(),
            },
            storage: StorageConfig { config_dir: None },
        }
    }

    /// Resolve the host trust mode once. Distributed unless trusted mode
    /// was asked for explicitly in development.
    pub fn trust_mode(&self) -> TrustMode {
        match (self.environment, self.host.trust_mode) {
            (Environment::Development, Some(TrustMode::Trusted)) => {
                tracing::warn!("Trusted host mode: devtools open without a password");
                TrustMode::Trusted
            }
            (_, Some(TrustMode::Trusted)) => {
                tracing::warn!(
                    "Trusted host mode requested in {:?}; enforcing the password ceremony instead",
                    self.environment
                );
                TrustMode::Distributed
            }
            (_, _) => TrustMode::Distributed,
        }
    }

    pub fn grace_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.devtools.grace_window_ms)
    }

    pub fn host_challenge_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.devtools.host_challenge_timeout_secs)
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn development_defaults_to_distributed_host() {
        let config = AppConfig::development();
        assert_eq!(config.trust_mode(), TrustMode::Distributed);
        assert_eq!(config.devtools.grace_window_ms, 3000);
        assert_eq!(config.devtools.min_password_len, 6);
    }

    #[test]
    fn unset_app_env_requires_password() {
        let config = AppConfig::from_vars(vars(&[]));
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.trust_mode(), TrustMode::Distributed);
    }

    #[test]
    fn unrecognised_app_env_requires_password() {
        let config = AppConfig::from_vars(vars(&[("APP_ENV", "qa-cluster")]));
        assert_eq!(config.trust_mode(), TrustMode::Distributed);
    }

    #[test]
    fn app_env_is_case_insensitive() {
        let config = AppConfig::from_vars(vars(&[
            ("APP_ENV", "Production"),
            ("HOST_TRUST_MODE", "trusted"),
        ]));
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.trust_mode(), TrustMode::Distributed);
    }

    #[test]
    fn development_honours_explicit_trusted() {
        let config = AppConfig::from_vars(vars(&[
            ("APP_ENV", "development"),
            ("HOST_TRUST_MODE", "trusted"),
        ]));
        assert_eq!(config.trust_mode(), TrustMode::Trusted);
    }

    #[test]
    fn overrides_apply() {
        let config = AppConfig::from_vars(vars(&[
            ("API_BASE_URL", "https://console.example.com/"),
            ("DEVTOOLS_GRACE_WINDOW_MS", "500"),
            ("HOST_SHORTCUTS", "F12, ,Alt+D"),
        ]));
        assert_eq!(config.api.base_url, "https://console.example.com");
        assert_eq!(config.devtools.grace_window_ms, 500);
        assert_eq!(config.host.shortcuts, vec!["F12".to_string(), "Alt+D".to_string()]);
    }

    #[test]
    fn production_never_runs_trusted() {
        let mut config = AppConfig::production();
        assert_eq!(config.trust_mode(), TrustMode::Distributed);

        config.host.trust_mode = Some(TrustMode::Trusted);
        assert_eq!(config.trust_mode(), TrustMode::Distributed);
    }

    #[test]
    fn shortcut_priority_order() {
        let config = AppConfig::staging();
        assert_eq!(config.host.shortcuts[0], "CommandOrControl+Shift+D");
        assert_eq!(config.host.shortcuts[2], "F12");
    }
}
