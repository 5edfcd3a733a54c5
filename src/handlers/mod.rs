mod files;
mod parser;
mod response;
mod router;

use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;
use std::path::PathBuf;
use std::sync::Arc;

pub use router::handle_request;

/// Everything a connection task needs, shared by all tasks of one server.
pub struct ServeContext {
    pub root: PathBuf,
    pub config: ServerConfig,
    pub metrics: Arc<ServerMetrics>,
}
