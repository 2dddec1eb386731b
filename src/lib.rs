pub mod api;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod devtools;
pub mod error;
pub mod host;
pub mod renderer;
pub mod route;
pub mod session;
pub mod types;

#[cfg(test)]
pub mod testing;
