// Library root: exposes the services for the binary and integration tests.
// The binary entry point is src/main.rs.

pub mod auth;
pub mod config;
pub mod console;
pub mod domain;
pub mod error;
pub mod logger;
pub mod services;
pub mod store;
