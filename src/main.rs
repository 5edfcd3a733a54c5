use repo_server::{load_server_config, RepoServer, ServeResult, ServerConfig};

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const LOG_FORMAT_ENV: &str = "REPO_SERVER_LOG_FORMAT";

fn main() -> ExitCode {
    init_tracing();

    // repo-server <root-dir> [config.json]
    let args: Vec<String> = env::args().collect();
    let Some(root) = args.get(1).map(PathBuf::from) else {
        eprintln!("usage: repo-server <root-dir> [config.json]");
        return ExitCode::from(2);
    };
    if !root.is_dir() {
        error!("Root directory {} does not exist", root.display());
        return ExitCode::from(2);
    }

    match run(&root, args.get(2).map(Path::new)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(root: &Path, config_path: Option<&Path>) -> ServeResult<()> {
    let config = match config_path {
        Some(path) => ServerConfig::from_file(path)?,
        None => load_server_config()?,
    };

    let mut server = RepoServer::start_with_config(root, config)?;

    // The parent process reads the base URL from the first stdout line.
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", server.base_url().as_str().trim_end_matches('/'))?;
    stdout.flush()?;
    drop(stdout);

    // Serve until the parent closes our stdin.
    io::copy(&mut io::stdin().lock(), &mut io::sink())?;
    info!("stdin closed, shutting down");

    server.stop()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    let _ = if env::var(LOG_FORMAT_ENV).map(|v| v == "json").unwrap_or(false) {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
