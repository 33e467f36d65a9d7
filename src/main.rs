//! tinyweb command line.
//!
//! ```text
//! tinyweb [--config FILE] [-d] serve [-p PORT] DIR...
//! tinyweb [--config FILE] [-d] proxy [-p PORT] [-s UPSTREAM_PORT] HOST
//! tinyweb [--config FILE] [-d] fetch [-f FILE] URL
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncWrite;
use url::Url;

use tinyweb::config::validation::{validate_proxy, validate_server, ValidationError};
use tinyweb::config::{load_config, ConfigError, ToolkitConfig, DEFAULT_PROXY_PORT, DEFAULT_SERVER_PORT};
use tinyweb::lifecycle::{wait_for_signal, Shutdown};
use tinyweb::net::{ConnectionListener, ConnectionWorker, Listener};
use tinyweb::observability::{init_logging, metrics, LogSinks, ERROR_TARGET};
use tinyweb::proxy::ProxyWorkerConfig;
use tinyweb::{client, OriginWorker, ProxyWorker};

const EXIT_CONFIG: u8 = 1;
const EXIT_BIND: u8 = 2;
const EXIT_OUTPUT: u8 = 6;

#[derive(Parser)]
#[command(name = "tinyweb", version, about = "Static web server, TCP proxy and fetch client")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose diagnostics on the error log
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve files from one or more directories
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        /// Searched in order; the first match wins
        directories: Vec<PathBuf>,
    },
    /// Relay every connection to an upstream host
    Proxy {
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(short = 's', long)]
        upstream_port: Option<u16>,
        host: Option<String>,
    },
    /// Download a http, https or ftp URL
    Fetch {
        /// Write the body here instead of stdout
        #[arg(short, long)]
        file: Option<PathBuf>,
        url: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("tinyweb: {e}");
                return ExitCode::from(EXIT_CONFIG);
            }
        },
        None => ToolkitConfig::default(),
    };
    config.observability.debug |= cli.debug;

    init_logging(&config.observability);

    match cli.command {
        Commands::Serve { port, directories } => {
            if port.is_some() {
                config.listener.port = port;
            }
            if !directories.is_empty() {
                config.server.directories = directories;
            }
            serve(config).await
        }
        Commands::Proxy {
            port,
            upstream_port,
            host,
        } => {
            if port.is_some() {
                config.listener.port = port;
            }
            if let Some(upstream_port) = upstream_port {
                config.proxy.upstream_port = upstream_port;
            }
            if host.is_some() {
                config.proxy.upstream_host = host;
            }
            proxy(config).await
        }
        Commands::Fetch { file, url } => fetch(&url, file).await,
    }
}

async fn serve(config: ToolkitConfig) -> ExitCode {
    if let Err(errors) = validate_server(&config.listener, &config.server) {
        return invalid(errors.into());
    }

    let sinks = LogSinks::new(config.server.server_name.clone(), config.observability.debug);
    for dir in &config.server.directories {
        sinks.debug(&format!("serving directory {}", dir.display()));
    }
    let worker = OriginWorker::new(config.server.directories.clone(), sinks.clone());

    run_listener(&config, DEFAULT_SERVER_PORT, worker, sinks).await
}

async fn proxy(config: ToolkitConfig) -> ExitCode {
    if let Err(errors) = validate_proxy(&config.listener, &config.proxy) {
        return invalid(errors.into());
    }
    let Some(worker_config) = ProxyWorkerConfig::from_config(&config.proxy) else {
        return invalid(vec![ValidationError::NoUpstream].into());
    };

    let sinks = LogSinks::new(config.proxy.server_name.clone(), config.observability.debug);
    let worker = ProxyWorker::new(worker_config, sinks.clone());

    run_listener(&config, DEFAULT_PROXY_PORT, worker, sinks).await
}

async fn run_listener<W: ConnectionWorker>(
    config: &ToolkitConfig,
    default_port: u16,
    worker: W,
    sinks: LogSinks,
) -> ExitCode {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                target: ERROR_TARGET,
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = match Listener::bind(&config.listener, default_port).await {
        Ok(listener) => listener,
        Err(e) => {
            sinks.error(&format!(
                "failed to listen on {}: {}",
                config.listener.bind_address(default_port),
                e
            ));
            return ExitCode::from(EXIT_BIND);
        }
    };

    let server = ConnectionListener::new(listener, worker, sinks);
    let tracker = server.tracker();
    let shutdown = Shutdown::new();
    let accepting = tokio::spawn(server.serve(shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();
    let _ = accepting.await;

    let grace = Duration::from_secs(config.lifecycle.shutdown_grace_secs);
    if !tracker.drain(grace).await {
        tracing::warn!(
            target: ERROR_TARGET,
            remaining = tracker.active_count(),
            "Grace period elapsed with connections still open"
        );
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

async fn fetch(url: &str, file: Option<PathBuf>) -> ExitCode {
    let url = match Url::parse(url) {
        Ok(url) => url,
        Err(e) => return failed(&client::ClientError::InvalidUrl(format!("{url}: {e}"))),
    };

    let result = match file {
        Some(path) => match tokio::fs::File::create(&path).await {
            Ok(mut out) => download(&url, &mut out).await,
            Err(e) => {
                tracing::error!(target: ERROR_TARGET, "failed to create {}: {}", path.display(), e);
                return ExitCode::from(EXIT_OUTPUT);
            }
        },
        None => download(&url, &mut tokio::io::stdout()).await,
    };

    match result {
        Ok(bytes) => {
            tracing::debug!(bytes, "Fetch complete");
            ExitCode::SUCCESS
        }
        Err(e) => failed(&e),
    }
}

async fn download<W: AsyncWrite + Unpin>(url: &Url, out: &mut W) -> Result<u64, client::ClientError> {
    client::fetch(url, out).await
}

fn failed(e: &client::ClientError) -> ExitCode {
    tracing::error!(target: ERROR_TARGET, "{e}");
    ExitCode::from(e.exit_code())
}

fn invalid(error: ConfigError) -> ExitCode {
    tracing::error!(target: ERROR_TARGET, "configuration: {error}");
    ExitCode::from(EXIT_CONFIG)
}
