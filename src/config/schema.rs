//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file.
//! Every field has a default so a missing file or a partial file is valid;
//! command-line values are layered on top by the binary.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default listen port of the origin server.
pub const DEFAULT_SERVER_PORT: u16 = 80;

/// Default listen port of the proxy.
pub const DEFAULT_PROXY_PORT: u16 = 8080;

/// Root configuration for every tinyweb program.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Listener configuration (bind host, port, connection limit).
    pub listener: ListenerConfig,

    /// Origin server settings.
    pub server: ServerConfig,

    /// Transparent proxy settings.
    pub proxy: ProxyConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Shutdown behaviour.
    pub lifecycle: LifecycleConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host or address to bind (e.g., "0.0.0.0").
    pub bind_host: String,

    /// Listen port. `None` selects the program's default port.
    pub port: Option<u16>,

    /// Maximum concurrently served connections. Accepting waits for a
    /// free slot once the limit is reached.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: None,
            max_connections: 1024,
        }
    }
}

impl ListenerConfig {
    /// The `host:port` string to bind, using `default_port` when none is configured.
    pub fn bind_address(&self, default_port: u16) -> String {
        format!("{}:{}", self.bind_host, self.port.unwrap_or(default_port))
    }
}

/// Origin server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directories searched in order for requested resources.
    pub directories: Vec<PathBuf>,

    /// Value of the `Server` response field and log prefix.
    pub server_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            server_name: "WebSrv".to_string(),
        }
    }
}

/// Transparent proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Upstream host every accepted connection is relayed to.
    pub upstream_host: Option<String>,

    /// Upstream port.
    pub upstream_port: u16,

    /// Relay buffer size used when the socket receive buffer size
    /// cannot be queried.
    pub relay_buffer_size: usize,

    /// Log prefix for proxy records.
    pub server_name: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_host: None,
            upstream_port: 80,
            relay_buffer_size: 64 * 1024,
            server_name: "WebProxSrv".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Promote per-connection debug records to INFO on the error log.
    pub debug: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long live connections may keep running after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 10,
        }
    }
}
