//! TCP listener and accept loop.
//!
//! # Responsibilities
//! - Bind to the configured address (failure is fatal to the caller)
//! - Accept incoming TCP connections
//! - Bound concurrently handled connections via a semaphore
//! - Dispatch each connection to a [`ConnectionWorker`] task
//! - Log accept errors and keep accepting

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Semaphore};
use tracing::Instrument;

use crate::config::ListenerConfig;
use crate::net::connection::ConnectionTracker;
use crate::observability::{metrics, LogSinks};

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
    /// The connection slot pool was closed.
    Closed,
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
            ListenerError::Closed => write!(f, "Connection slots closed"),
        }
    }
}

impl std::error::Error for ListenerError {}

/// Handles one accepted connection from start to close.
///
/// The stream is owned by the worker; dropping it closes the connection.
pub trait ConnectionWorker: Send + Sync + 'static {
    fn handle(&self, stream: TcpStream, peer: SocketAddr) -> impl Future<Output = ()> + Send;
}

/// A bounded TCP listener.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// accepting waits until a slot becomes available.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig, default_port: u16) -> Result<Self, ListenerError> {
        let address = config.bind_address(default_port);
        let listener = TcpListener::bind(&address).await.map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a connection slot.
///
/// Dropping it returns the slot, including when the handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Accept loop dispatching every connection to a worker task.
pub struct ConnectionListener<W> {
    listener: Listener,
    worker: Arc<W>,
    sinks: LogSinks,
    tracker: ConnectionTracker,
}

impl<W: ConnectionWorker> ConnectionListener<W> {
    pub fn new(listener: Listener, worker: W, sinks: LogSinks) -> Self {
        Self {
            listener,
            worker: Arc::new(worker),
            sinks,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Handle on the live-connection count, for draining after shutdown.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept until `shutdown` fires. Connections already dispatched keep
    /// running; use [`tracker`](Self::tracker) to wait for them.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Listener received shutdown signal, no longer accepting");
                    break;
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(ListenerError::Closed) => break,
                Err(e) => {
                    self.sinks.error(&format!("failed to process socket: {e}"));
                    continue;
                }
            };

            metrics::record_connection(self.sinks.server_name());

            let guard = self.tracker.track();
            let span = tracing::info_span!("connection", id = %guard.id(), peer = %peer);
            let worker = Arc::clone(&self.worker);

            tokio::spawn(
                async move {
                    worker.handle(stream, peer).await;
                    drop(permit);
                    drop(guard);
                }
                .instrument(span),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    struct Greeter {
        served: Arc<AtomicUsize>,
    }

    impl ConnectionWorker for Greeter {
        async fn handle(&self, mut stream: TcpStream, _peer: SocketAddr) {
            self.served.fetch_add(1, Ordering::SeqCst);
            let _ = stream.write_all(b"hi").await;
        }
    }

    fn local_config(max_connections: usize) -> ListenerConfig {
        ListenerConfig {
            bind_host: "127.0.0.1".into(),
            port: Some(0),
            max_connections,
        }
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = Listener::bind(&local_config(1), 0).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let config = ListenerConfig {
            port: Some(port),
            ..local_config(1)
        };
        assert!(matches!(Listener::bind(&config, 0).await, Err(ListenerError::Bind(_))));
    }

    #[tokio::test]
    async fn permits_are_released_with_the_connection() {
        let listener = Listener::bind(&local_config(2), 0).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _peer, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 1);

        drop(permit);
        assert_eq!(listener.available_permits(), listener.max_connections());
    }

    #[tokio::test]
    async fn dispatches_every_connection_until_shutdown() {
        use tokio::io::AsyncReadExt;

        let listener = Listener::bind(&local_config(4), 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let served = Arc::new(AtomicUsize::new(0));
        let server = ConnectionListener::new(
            listener,
            Greeter {
                served: served.clone(),
            },
            LogSinks::new("test", false),
        );
        let tracker = server.tracker();

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(server.serve(rx));

        for _ in 0..3 {
            let mut client = TcpStream::connect(addr).await.unwrap();
            let mut reply = Vec::new();
            client.read_to_end(&mut reply).await.unwrap();
            assert_eq!(reply, b"hi");
        }

        assert!(tracker.drain(Duration::from_secs(2)).await);
        assert_eq!(served.load(Ordering::SeqCst), 3);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
