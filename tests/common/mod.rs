//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tinyweb::config::ListenerConfig;
use tinyweb::net::{ConnectionListener, ConnectionWorker, Listener};
use tinyweb::observability::LogSinks;
use tinyweb::proxy::{ProxyWorker, ProxyWorkerConfig, Upstream};
use tinyweb::{OriginWorker, Shutdown};

pub fn local_listener() -> ListenerConfig {
    ListenerConfig {
        bind_host: "127.0.0.1".into(),
        port: Some(0),
        max_connections: 16,
    }
}

async fn start<W: ConnectionWorker>(worker: W, sinks: LogSinks) -> (SocketAddr, Shutdown) {
    let listener = Listener::bind(&local_listener(), 0).await.unwrap();
    let server = ConnectionListener::new(listener, worker, sinks);
    let addr = server.local_addr().unwrap();

    let shutdown = Shutdown::new();
    tokio::spawn(server.serve(shutdown.subscribe()));
    (addr, shutdown)
}

/// Start an origin server on an ephemeral port.
pub async fn start_server(directories: Vec<PathBuf>, read_timeout: Duration) -> (SocketAddr, Shutdown) {
    let sinks = LogSinks::new("WebSrv", false);
    let worker = OriginWorker::new(directories, sinks.clone()).with_read_timeout(read_timeout);
    start(worker, sinks).await
}

/// Start a proxy relaying to `upstream` on an ephemeral port.
pub async fn start_proxy(upstream: SocketAddr) -> (SocketAddr, Shutdown) {
    let sinks = LogSinks::new("WebProxSrv", false);
    let config = ProxyWorkerConfig {
        upstream: Upstream {
            host: upstream.ip().to_string(),
            port: upstream.port(),
        },
        fallback_buffer: 4096,
    };
    start(ProxyWorker::new(config, sinks.clone()), sinks).await
}

/// Start a programmable upstream; `f` owns each accepted connection.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(f(socket));
        }
    });
    addr
}

/// An upstream that echoes everything back and closes after the client half-closes.
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|mut socket| async move {
        let (mut read, mut write) = socket.split();
        let _ = tokio::io::copy(&mut read, &mut write).await;
        let _ = write.shutdown().await;
    })
    .await
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Send `request` and read until the server closes.
pub async fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap();
    response
}

/// Split a raw response into (status line, header lines, body).
pub fn split_response(raw: &[u8]) -> (String, Vec<String>, Vec<u8>) {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header terminator");
    let head = String::from_utf8(raw[..end].to_vec()).unwrap();
    let mut lines = head.split("\r\n").map(str::to_string);
    let status = lines.next().unwrap();
    (status, lines.collect(), raw[end + 4..].to_vec())
}
