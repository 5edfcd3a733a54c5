use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("Server worker did not become ready within {0:?}")]
    ReadyTimeout(Duration),
    #[error("Server worker did not stop within {0:?}")]
    ShutdownTimeout(Duration),
    #[error("Server worker exited before signalling readiness")]
    WorkerExited,
    #[error("Server worker panicked")]
    WorkerPanicked,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Config read error: {0}")]
    ConfigRead(String),
    #[error("Config parse error: {0}")]
    ConfigParse(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Metrics error: {0}")]
    Metrics(String),
}

pub type ServeResult<T> = Result<T, ServeError>;
