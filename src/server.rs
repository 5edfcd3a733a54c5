//! Ephemeral static-file server.
//!
//! [`RepoServer::start`] binds an OS-assigned port and returns only once the
//! worker thread is inside its accept loop. [`RepoServer::stop`] (or dropping
//! the handle) closes the listener and joins the worker.

use crate::config::ServerConfig;
use crate::errors::{ServeError, ServeResult};
use crate::handlers::{handle_request, ServeContext};
use crate::metrics::ServerMetrics;
use async_channel::{Receiver, Sender};
use smol::net::TcpListener;
use smol::{LocalExecutor, Timer};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

// Back-off after a failed accept (e.g. EMFILE) so the loop does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

type Hook = Box<dyn FnOnce() + Send + 'static>;

/// Callbacks run on the worker thread around the accept loop.
#[derive(Default)]
struct WorkerHooks {
    before_ready: Option<Hook>,
    before_exit: Option<Hook>,
}

struct Worker {
    thread: JoinHandle<()>,
    shutdown: Sender<()>,
    exited: Receiver<()>,
}

pub struct RepoServer {
    port: u16,
    local_addr: SocketAddr,
    root: PathBuf,
    base_url: Url,
    config: ServerConfig,
    metrics: Arc<ServerMetrics>,
    worker: Option<Worker>,
}

impl RepoServer {
    pub fn start(root: impl Into<PathBuf>) -> ServeResult<Self> {
        Self::start_with_config(root, ServerConfig::default())
    }

    pub fn start_with_config(root: impl Into<PathBuf>, config: ServerConfig) -> ServeResult<Self> {
        Self::start_inner(root.into(), config, WorkerHooks::default())
    }

    fn start_inner(root: PathBuf, config: ServerConfig, hooks: WorkerHooks) -> ServeResult<Self> {
        config.validate()?;

        let bind_addr = format!("{}:0", config.bind_host);
        let std_listener = std::net::TcpListener::bind((config.bind_host.as_str(), 0)).map_err(
            |source| ServeError::Bind {
                addr: bind_addr.clone(),
                source,
            },
        )?;
        let local_addr = std_listener.local_addr().map_err(|source| ServeError::Bind {
            addr: bind_addr.clone(),
            source,
        })?;
        let port = local_addr.port();
        let base_url = Url::parse(&format!("http://{}:{}", config.advertised_host, port))?;
        let listener = TcpListener::try_from(std_listener).map_err(|source| ServeError::Bind {
            addr: bind_addr,
            source,
        })?;

        let metrics = Arc::new(ServerMetrics::new()?);
        let ctx = Arc::new(ServeContext {
            root: root.clone(),
            config: config.clone(),
            metrics: Arc::clone(&metrics),
        });

        let (ready_tx, ready_rx) = async_channel::bounded::<()>(1);
        let (shutdown_tx, shutdown_rx) = async_channel::bounded::<()>(1);
        let (exited_tx, exited_rx) = async_channel::bounded::<()>(1);

        let thread = thread::Builder::new()
            .name(format!("repo-server-{}", port))
            .spawn(move || {
                if let Some(hook) = hooks.before_ready {
                    hook();
                }
                run_worker(listener, ctx, ready_tx, shutdown_rx);
                if let Some(hook) = hooks.before_exit {
                    hook();
                }
                // Dropped last: the listener is already closed when `stop` sees this.
                drop(exited_tx);
            })?;

        let mut server = Self {
            port,
            local_addr,
            root,
            base_url,
            config,
            metrics,
            worker: Some(Worker {
                thread,
                shutdown: shutdown_tx,
                exited: exited_rx,
            }),
        };

        let ready_timeout = server.config.ready_timeout();
        let ready = smol::block_on(smol::future::or(
            async { ready_rx.recv().await.map_err(|_| ServeError::WorkerExited) },
            async {
                Timer::after(ready_timeout).await;
                Err(ServeError::ReadyTimeout(ready_timeout))
            },
        ));
        if let Err(err) = ready {
            if let Err(stop_err) = server.stop() {
                warn!(error = %stop_err, "Failed to tear down server after startup failure");
            }
            return Err(err);
        }

        info!(
            port,
            root = %server.root.display(),
            base_url = %server.base_url,
            "Repo server listening"
        );
        Ok(server)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `http://<advertised host>:<port>`, stable for the lifetime of the server.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins `relative` onto the base URL, e.g. `url_for("repo/")`.
    pub fn url_for(&self, relative: &str) -> ServeResult<Url> {
        Ok(self.base_url.join(relative.trim_start_matches('/'))?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|worker| !worker.thread.is_finished())
            .unwrap_or(false)
    }

    /// Stops the accept loop and joins the worker. Calling it again is a no-op.
    ///
    /// If the worker does not exit within the shutdown timeout the thread is
    /// left detached and `ShutdownTimeout` is returned.
    pub fn stop(&mut self) -> ServeResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        worker.shutdown.close();

        let timeout = self.config.shutdown_timeout();
        let exited = smol::block_on(smol::future::or(
            async {
                let _ = worker.exited.recv().await;
                true
            },
            async {
                Timer::after(timeout).await;
                false
            },
        ));
        if !exited {
            error!(port = self.port, ?timeout, "Repo server worker did not stop");
            return Err(ServeError::ShutdownTimeout(timeout));
        }

        worker.thread.join().map_err(|_| ServeError::WorkerPanicked)?;
        info!(port = self.port, "Repo server stopped");
        Ok(())
    }
}

impl Drop for RepoServer {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!(port = self.port, error = %err, "Failed to stop repo server");
        }
    }
}

fn run_worker(
    listener: TcpListener,
    ctx: Arc<ServeContext>,
    ready: Sender<()>,
    shutdown: Receiver<()>,
) {
    let executor = LocalExecutor::new();
    smol::block_on(executor.run(accept_loop(&executor, listener, ctx, ready, shutdown)));
    // In-flight connection tasks are dropped together with the executor.
}

async fn accept_loop(
    executor: &LocalExecutor<'_>,
    listener: TcpListener,
    ctx: Arc<ServeContext>,
    ready: Sender<()>,
    shutdown: Receiver<()>,
) {
    if ready.send(()).await.is_err() {
        return;
    }
    drop(ready);

    loop {
        let next = smol::future::or(
            async { Some(listener.accept().await) },
            async {
                let _ = shutdown.recv().await;
                None
            },
        )
        .await;

        match next {
            Some(Ok((stream, addr))) => {
                executor
                    .spawn(handle_request(stream, addr, Arc::clone(&ctx)))
                    .detach();
            }
            Some(Err(e)) => {
                warn!("Failed to accept connection: {}", e);
                backoff(&e).await;
            }
            None => break,
        }
    }

    debug!("Accept loop finished");
}

async fn backoff(err: &io::Error) {
    if err.kind() != io::ErrorKind::ConnectionAborted {
        Timer::after(ACCEPT_ERROR_BACKOFF).await;
    }
}
