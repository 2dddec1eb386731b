//! Role-gated route authorization.
//!
//! [`evaluate`] is a pure function of the route's policy and the session; it
//! never fails, it only redirects.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::session::Session;
use crate::types::Role;

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub path: String,
    pub name: String,
    pub requires_auth: bool,
    /// Empty means any authenticated role
    pub required_roles: BTreeSet<Role>,
}

impl RouteDescriptor {
    pub fn public(path: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            requires_auth: false,
            required_roles: BTreeSet::new(),
        }
    }

    pub fn protected(path: &str, name: &str) -> Self {
        Self {
            requires_auth: true,
            ..Self::public(path, name)
        }
    }

    pub fn with_roles(mut self, roles: &[Role]) -> Self {
        self.required_roles = roles.iter().copied().collect();
        self
    }

    pub fn is_login_or_register(&self) -> bool {
        self.path == LOGIN_PATH || self.path == REGISTER_PATH
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardDecision {
    Allow,
    RedirectLogin,
    RedirectHome,
}

impl GuardDecision {
    /// Where the navigation ends up, `None` when allowed through.
    pub fn redirect_path(&self) -> Option<&'static str> {
        match self {
            GuardDecision::Allow => None,
            GuardDecision::RedirectLogin => Some(LOGIN_PATH),
            GuardDecision::RedirectHome => Some(HOME_PATH),
        }
    }
}

/// First matching rule wins.
pub fn evaluate(route: &RouteDescriptor, session: &Session) -> GuardDecision {
    let authenticated = session.authenticated();

    if route.requires_auth && !authenticated {
        return GuardDecision::RedirectLogin;
    }

    if !route.requires_auth && authenticated && route.is_login_or_register() {
        return GuardDecision::RedirectHome;
    }

    if !route.required_roles.is_empty() {
        let role = session.user.effective_role();
        if !route.required_roles.iter().any(|r| r.as_str() == role) {
            return GuardDecision::RedirectHome;
        }
    }

    GuardDecision::Allow
}

/// Static route table, built once at startup.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteDescriptor>) -> Self {
        Self { routes }
    }

    /// The admin console's routes. Everything under the layout requires a
    /// session; management screens are restricted by role.
    pub fn console() -> Self {
        const MANAGERS: &[Role] = &[Role::SuperAdmin, Role::Admin];

        Self::new(vec![
            RouteDescriptor::public(LOGIN_PATH, "Login"),
            RouteDescriptor::public(REGISTER_PATH, "Register"),
            RouteDescriptor::protected(HOME_PATH, "Home"),
            RouteDescriptor::protected("/products", "Products").with_roles(MANAGERS),
            RouteDescriptor::protected("/import", "Import").with_roles(MANAGERS),
            RouteDescriptor::protected("/template", "Template").with_roles(MANAGERS),
            RouteDescriptor::protected("/upload", "Upload").with_roles(MANAGERS),
            RouteDescriptor::protected("/logs", "Logs").with_roles(MANAGERS),
            RouteDescriptor::protected("/settings", "Settings").with_roles(MANAGERS),
            RouteDescriptor::protected("/user", "User").with_roles(MANAGERS),
            RouteDescriptor::protected("/members", "Members").with_roles(&[Role::SuperAdmin]),
            RouteDescriptor::protected("/profile", "Profile"),
            RouteDescriptor::protected("/redirect", "Redirect"),
        ])
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    /// Exact match first, then the longest registered prefix (`/redirect/x`).
    /// Anything else lands in the authenticated layout with no role rule.
    pub fn resolve(&self, path: &str) -> RouteDescriptor {
        let path = normalize(path);

        if let Some(route) = self.routes.iter().find(|r| r.path == path) {
            return route.clone();
        }

        self.routes
            .iter()
            .filter(|r| r.path != HOME_PATH && path.starts_with(&format!("{}/", r.path)))
            .max_by_key(|r| r.path.len())
            .cloned()
            .unwrap_or_else(|| RouteDescriptor::protected(&path, "NotFound"))
    }

    pub fn navigate(&self, path: &str, session: &Session) -> GuardDecision {
        let route = self.resolve(path);
        let decision = evaluate(&route, session);
        tracing::debug!("Navigation to {} -> {:?}", route.path, decision);
        decision
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        HOME_PATH.to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserInfo;

    fn session(role: Option<&str>) -> Session {
        Session::new(
            "token",
            UserInfo {
                role: role.map(str::to_string),
                ..Default::default()
            },
        )
    }

    #[test]
    fn unauthenticated_protected_route_redirects_to_login() {
        let anonymous = Session::default();
        for route in RouteTable::console().routes().iter().filter(|r| r.requires_auth) {
            assert_eq!(evaluate(route, &anonymous), GuardDecision::RedirectLogin, "{}", route.path);
        }
    }

    #[test]
    fn login_precedes_role_check() {
        let route =
            RouteDescriptor::protected("/members", "Members").with_roles(&[Role::SuperAdmin]);
        assert_eq!(evaluate(&route, &Session::default()), GuardDecision::RedirectLogin);
    }

    #[test]
    fn authenticated_user_is_bounced_from_login_and_register() {
        let s = session(Some("ADMIN"));
        let login = RouteDescriptor::public(LOGIN_PATH, "Login");
        assert_eq!(evaluate(&login, &s), GuardDecision::RedirectHome);
        let register = RouteDescriptor::public(REGISTER_PATH, "Register");
        assert_eq!(evaluate(&register, &s), GuardDecision::RedirectHome);
        assert_eq!(evaluate(&RouteDescriptor::public("/about", "About"), &s), GuardDecision::Allow);
    }

    #[test]
    fn insufficient_role_redirects_home() {
        let route =
            RouteDescriptor::protected("/members", "Members").with_roles(&[Role::SuperAdmin]);
        assert_eq!(evaluate(&route, &session(Some("USER"))), GuardDecision::RedirectHome);
        assert_eq!(evaluate(&route, &session(Some("ADMIN"))), GuardDecision::RedirectHome);
        assert_eq!(evaluate(&route, &session(Some("SUPER_ADMIN"))), GuardDecision::Allow);
    }

    #[test]
    fn missing_role_defaults_to_user() {
        let table = RouteTable::console();
        let s = session(None);
        assert_eq!(table.navigate("/products", &s), GuardDecision::RedirectHome);
        assert_eq!(table.navigate("/profile", &s), GuardDecision::Allow);
        assert_eq!(table.navigate("/", &s), GuardDecision::Allow);
    }

    #[test]
    fn resolve_handles_prefixes_and_unknown_paths() {
        let table = RouteTable::console();
        assert_eq!(table.resolve("/redirect/products").name, "Redirect");
        assert_eq!(table.resolve("products/").name, "Products");

        let unknown = table.resolve("/nowhere");
        assert!(unknown.requires_auth);
        assert!(unknown.required_roles.is_empty());
        assert_eq!(table.navigate("/nowhere", &Session::default()), GuardDecision::RedirectLogin);
    }
}
