// Library exports for ConnectHub
// This allows integration tests and the binary to share the forum modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
