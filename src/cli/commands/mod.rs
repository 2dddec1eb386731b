pub mod auth;
pub mod devtools;
pub mod route;
pub mod shell;
