use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;

use crate::config::ProxyConfig;
use crate::net::ConnectionWorker;
use crate::observability::LogSinks;
use crate::proxy::relay::{RelayPair, Upstream};

/// Per-connection settings of the proxy.
#[derive(Debug, Clone)]
pub struct ProxyWorkerConfig {
    pub upstream: Upstream,
    pub fallback_buffer: usize,
}

impl ProxyWorkerConfig {
    /// Returns `None` when no upstream host is configured.
    pub fn from_config(config: &ProxyConfig) -> Option<Self> {
        let host = config.upstream_host.clone()?;
        Some(Self {
            upstream: Upstream {
                host,
                port: config.upstream_port,
            },
            fallback_buffer: config.relay_buffer_size,
        })
    }
}

/// Relays every accepted connection to the configured upstream.
#[derive(Debug, Clone)]
pub struct ProxyWorker {
    config: Arc<ProxyWorkerConfig>,
    sinks: LogSinks,
}

impl ProxyWorker {
    pub fn new(config: ProxyWorkerConfig, sinks: LogSinks) -> Self {
        Self {
            config: Arc::new(config),
            sinks,
        }
    }
}

impl ConnectionWorker for ProxyWorker {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        self.sinks.debug("connecting to server");

        let pair = match RelayPair::open(stream, peer, &self.config.upstream, self.config.fallback_buffer).await {
            Ok(pair) => pair,
            Err(e) => {
                self.sinks.error(&e.to_string());
                return;
            }
        };

        self.sinks.debug(&format!(
            "connected to server {} for client {}",
            pair.upstream_addr(),
            pair.client_addr()
        ));

        pair.run(&self.sinks).await;
    }
}
