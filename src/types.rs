/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Console roles as issued by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUPER_ADMIN" => Ok(Role::SuperAdmin),
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Cached user profile. Every field is optional because the backend omits
/// fields freely and a corrupt cache degrades to an empty profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Raw role string; unknown roles are kept verbatim and match nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserInfo {
    /// The role used for authorization, `USER` when none is set.
    pub fn effective_role(&self) -> &str {
        match self.role.as_deref() {
            Some(role) if !role.is_empty() => role,
            _ => Role::User.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Remember the username for the login form
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user_info: UserInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_role_defaults_to_user() {
        assert_eq!(UserInfo::default().effective_role(), "USER");

        let info = UserInfo { role: Some(String::new()), ..Default::default() };
        assert_eq!(info.effective_role(), "USER");

        let info = UserInfo { role: Some("SUPER_ADMIN".into()), ..Default::default() };
        assert_eq!(info.effective_role(), "SUPER_ADMIN");
    }

    #[test]
    fn user_info_uses_backend_field_names() {
        let info: UserInfo = serde_json::from_str(
            r#"{"id": 7, "username": "admin-plus", "email": null, "role": "ADMIN", "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(info.id, Some(7));
        assert_eq!(info.role.as_deref(), Some("ADMIN"));
        assert!(info.email.is_none());
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("super_admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("ROOT".parse::<Role>().is_err());
    }
}
