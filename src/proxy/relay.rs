//! Client/upstream connection pair.
//!
//! [`RelayPair`] is the supervisor of one proxied connection: it runs the
//! two directions concurrently, joins both, logs each outcome on its own,
//! and only then releases the sockets.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::observability::{metrics, LogSinks};
use crate::proxy::forward::{Direction, ForwardTask, RelayResult};

/// Where the proxy relays to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Error opening the upstream side of a relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to connect to webserver {upstream}: {source}")]
    Connect {
        upstream: Upstream,
        #[source]
        source: io::Error,
    },
    #[error("failed to read socket address: {0}")]
    Address(#[source] io::Error),
}

/// Receive buffer size of `stream`, or `fallback` if it cannot be read.
pub fn receive_buffer_size(stream: &TcpStream, fallback: usize) -> usize {
    socket2::SockRef::from(stream)
        .recv_buffer_size()
        .ok()
        .filter(|size| *size > 0)
        .unwrap_or(fallback)
}

/// An accepted client connection and its freshly opened upstream connection.
#[derive(Debug)]
pub struct RelayPair {
    client: TcpStream,
    client_addr: SocketAddr,
    upstream: TcpStream,
    upstream_addr: SocketAddr,
    fallback_buffer: usize,
}

impl RelayPair {
    /// Open the upstream connection for `client`.
    ///
    /// On failure the client stream is dropped (closed) with the error.
    pub async fn open(
        client: TcpStream,
        client_addr: SocketAddr,
        upstream: &Upstream,
        fallback_buffer: usize,
    ) -> Result<Self, RelayError> {
        let stream = TcpStream::connect((upstream.host.as_str(), upstream.port))
            .await
            .map_err(|source| RelayError::Connect {
                upstream: upstream.clone(),
                source,
            })?;
        let upstream_addr = stream.peer_addr().map_err(RelayError::Address)?;

        Ok(Self {
            client,
            client_addr,
            upstream: stream,
            upstream_addr,
            fallback_buffer,
        })
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    pub fn upstream_addr(&self) -> SocketAddr {
        self.upstream_addr
    }

    /// Relay both directions to completion.
    ///
    /// Results come back as `[client→upstream, upstream→client]` and are
    /// logged in that order. Both sockets are closed when this returns.
    pub async fn run(mut self, sinks: &LogSinks) -> [RelayResult; 2] {
        let to_upstream = ForwardTask {
            direction: Direction::ClientToUpstream,
            from: self.client_addr,
            to: self.upstream_addr,
            buffer_size: receive_buffer_size(&self.client, self.fallback_buffer),
        };
        let to_client = ForwardTask {
            direction: Direction::UpstreamToClient,
            from: self.upstream_addr,
            to: self.client_addr,
            buffer_size: receive_buffer_size(&self.upstream, self.fallback_buffer),
        };

        sinks.debug("submit communication tasks");

        let results = {
            let (mut client_read, mut client_write) = self.client.split();
            let (mut upstream_read, mut upstream_write) = self.upstream.split();

            let (up, down) = tokio::join!(
                to_upstream.run(&mut client_read, &mut upstream_write),
                to_client.run(&mut upstream_read, &mut client_write),
            );
            [up, down]
        };

        for result in &results {
            sinks.debug(&format!("handle {} result", result.direction));
            report(sinks, result);
        }

        results
    }
}

fn report(sinks: &LogSinks, result: &RelayResult) {
    metrics::record_relay(result);
    match &result.error {
        Some(message) => sinks.error(message),
        None => sinks.forwarded(result),
    }
}
