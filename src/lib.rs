//! Ephemeral static-file server for end-to-end package tests.
//!
//! Serves a mock package repository directory over HTTP on an OS-assigned
//! port for as long as the owning [`RepoServer`] handle lives:
//! - race-free startup (the handle is returned once the accept loop runs)
//! - bounded, idempotent shutdown, also run on drop
//! - static file semantics: 404 for missing files, redirects and listings for directories

pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod tracing_util;

pub use config::{load_server_config, ServerConfig};
pub use errors::{ServeError, ServeResult};
pub use metrics::ServerMetrics;
pub use server::RepoServer;

#[cfg(test)]
mod tracing_tests;
