use crate::errors::{ServeError, ServeResult};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "REPO_SERVER_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(rename = "bindHost", default = "default_bind_host")]
    pub bind_host: String,
    #[serde(rename = "advertisedHost", default = "default_advertised_host")]
    pub advertised_host: String,
    #[serde(rename = "readyTimeoutMs", default = "default_timeout_ms")]
    pub ready_timeout_ms: u64,
    #[serde(rename = "shutdownTimeoutMs", default = "default_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    #[serde(rename = "directoryListing", default = "default_directory_listing")]
    pub directory_listing: bool,
    #[serde(rename = "indexFiles", default = "default_index_files")]
    pub index_files: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            advertised_host: default_advertised_host(),
            ready_timeout_ms: default_timeout_ms(),
            shutdown_timeout_ms: default_timeout_ms(),
            directory_listing: default_directory_listing(),
            index_files: default_index_files(),
        }
    }
}

impl ServerConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn with_bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    pub fn with_advertised_host(mut self, host: impl Into<String>) -> Self {
        self.advertised_host = host.into();
        self
    }

    pub fn with_directory_listing(mut self, enabled: bool) -> Self {
        self.directory_listing = enabled;
        self
    }

    /// A zero timeout would let the timer win every race against the worker.
    pub fn validate(&self) -> ServeResult<()> {
        if self.ready_timeout_ms == 0 {
            return Err(ServeError::InvalidConfig(
                "readyTimeoutMs must be greater than zero".to_string(),
            ));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(ServeError::InvalidConfig(
                "shutdownTimeoutMs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> ServeResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ServeError::ConfigRead(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| ServeError::ConfigParse(format!("{}: {}", path.display(), e)))
    }
}

/// Loads the config named by `REPO_SERVER_CONFIG_PATH`, or the defaults when unset.
pub fn load_server_config() -> ServeResult<ServerConfig> {
    match env::var_os(CONFIG_PATH_ENV) {
        Some(path) => ServerConfig::from_file(Path::new(&path)),
        None => Ok(ServerConfig::default()),
    }
}

// Python's ("", 0) binds every interface; remote test machines reach the server that way.
pub fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_advertised_host() -> String {
    "localhost".to_string()
}

pub fn default_timeout_ms() -> u64 {
    5_000
}

pub fn default_directory_listing() -> bool {
    true
}

pub fn default_index_files() -> Vec<String> {
    vec!["index.html".to_string(), "index.htm".to_string()]
}
