//! Structured logging.
//!
//! Two named sinks: the access log (`target: "access"`, stdout) and the
//! error log (everything else, stderr). Workers never touch the global
//! subscriber directly; they receive a [`LogSinks`] handle when they are
//! built.

use std::net::SocketAddr;

use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::config::ObservabilityConfig;
use crate::proxy::RelayResult;

/// Target of access records.
pub const ACCESS_TARGET: &str = "access";

/// Target of error and debug records.
pub const ERROR_TARGET: &str = "error";

/// Install the process subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this twice is
/// harmless; the second call is ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let access = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_filter(filter_fn(|meta| meta.target() == ACCESS_TARGET));

    let errors = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(|meta| meta.target() != ACCESS_TARGET));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(access)
        .with(errors)
        .try_init();
}

/// Logging handle carried by listeners and workers.
#[derive(Debug, Clone)]
pub struct LogSinks {
    server_name: String,
    debug: bool,
}

impl LogSinks {
    pub fn new(server_name: impl Into<String>, debug: bool) -> Self {
        Self {
            server_name: server_name.into(),
            debug,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Access record for a response written by the origin server.
    pub fn served(&self, client: &SocketAddr, code: u16, bytes: u64, resource: &str) {
        tracing::info!(
            target: ACCESS_TARGET,
            server = %self.server_name,
            "{} {} {} {}",
            client.ip(),
            code,
            bytes,
            resource
        );
    }

    /// Access record for one completed relay direction.
    pub fn forwarded(&self, result: &RelayResult) {
        tracing::info!(
            target: ACCESS_TARGET,
            server = %self.server_name,
            direction = %result.direction,
            "Forwarded {} bytes from: {} to: {}",
            result.bytes,
            result.from,
            result.to
        );
    }

    /// Warning on the error log.
    pub fn error(&self, message: &str) {
        tracing::warn!(target: ERROR_TARGET, server = %self.server_name, "{}", message);
    }

    /// Debug trace; promoted to INFO when the debug flag is set.
    pub fn debug(&self, message: &str) {
        if self.debug {
            tracing::info!(target: ERROR_TARGET, "{}: {}", self.server_name, message);
        } else {
            tracing::debug!(target: ERROR_TARGET, "{}: {}", self.server_name, message);
        }
    }
}
