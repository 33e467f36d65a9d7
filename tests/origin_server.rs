//! End-to-end tests of the origin server over real sockets.

mod common;

use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use common::{exchange, split_response, start_server};

const INDEX: &[u8] = b"<html><body>hello</body></html>";

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), INDEX).unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"plain").unwrap();
    dir
}

#[tokio::test]
async fn serves_index_for_root() {
    let dir = site();
    let (addr, shutdown) = start_server(vec![dir.path().to_path_buf()], Duration::from_secs(2)).await;

    let raw = exchange(addr, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let (status, fields, body) = split_response(&raw);

    assert_eq!(status, "HTTP/1.1 200 OK");
    assert!(fields.iter().any(|f| f.starts_with("Date: ")));
    assert!(fields.contains(&"Server: WebSrv".to_string()));
    assert!(fields.contains(&"Connection: close".to_string()));
    assert!(fields.contains(&"Content-type: text/html".to_string()));
    assert!(fields.contains(&format!("Content-length: {}", INDEX.len())));
    assert_eq!(body, INDEX);

    shutdown.trigger();
}

#[tokio::test]
async fn later_directories_are_searched() {
    let empty = tempfile::tempdir().unwrap();
    let dir = site();
    let (addr, shutdown) = start_server(
        vec![empty.path().to_path_buf(), dir.path().to_path_buf()],
        Duration::from_secs(2),
    )
    .await;

    let raw = exchange(addr, b"GET /notes.txt HTTP/1.0\r\n\r\n").await;
    let (status, fields, body) = split_response(&raw);

    assert_eq!(status, "HTTP/1.1 200 OK");
    assert!(fields.contains(&"Content-type: text/plain".to_string()));
    assert_eq!(body, b"plain");

    shutdown.trigger();
}

#[tokio::test]
async fn missing_resource_is_404() {
    let dir = site();
    let (addr, shutdown) = start_server(vec![dir.path().to_path_buf()], Duration::from_secs(2)).await;

    let raw = exchange(addr, b"GET /nope.html HTTP/1.1\r\n\r\n").await;
    let (status, fields, body) = split_response(&raw);

    assert_eq!(status, "HTTP/1.1 404 Not Found");
    assert!(fields.contains(&format!("Content-length: {}", body.len())));
    assert!(String::from_utf8(body).unwrap().contains("Not Found"));

    shutdown.trigger();
}

#[tokio::test]
async fn non_get_is_405() {
    let dir = site();
    let (addr, shutdown) = start_server(vec![dir.path().to_path_buf()], Duration::from_secs(2)).await;

    let raw = exchange(addr, b"POST / HTTP/1.1\r\nContent-length: 0\r\n\r\n").await;
    let (status, _, _) = split_response(&raw);
    assert_eq!(status, "HTTP/1.1 405 Method Not Allowed");

    shutdown.trigger();
}

#[tokio::test]
async fn traversal_is_403() {
    let dir = site();
    let (addr, shutdown) = start_server(vec![dir.path().to_path_buf()], Duration::from_secs(2)).await;

    let raw = exchange(addr, b"GET /../etc/passwd HTTP/1.1\r\n\r\n").await;
    let (status, _, _) = split_response(&raw);
    assert_eq!(status, "HTTP/1.1 403 Forbidden");

    shutdown.trigger();
}

#[tokio::test]
async fn malformed_requests_are_400() {
    let dir = site();
    let (addr, shutdown) = start_server(vec![dir.path().to_path_buf()], Duration::from_secs(2)).await;

    for request in [
        &b"GET /\r\n\r\n"[..],
        b"GET / HTTP/1.1\r\nHost x\r\n\r\n",
        b"GET / HTTP/1.1\nHost: x\n\n",
        b"GET / HTTP/1.1\r\nHost: x\r\n",
    ] {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut stream, request).await.unwrap();
        tokio::io::AsyncWriteExt::shutdown(&mut stream).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let (status, _, _) = split_response(&raw);
        assert_eq!(status, "HTTP/1.1 400 Bad Request", "request {request:?}");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn silent_client_gets_408() {
    let dir = site();
    let (addr, shutdown) = start_server(vec![dir.path().to_path_buf()], Duration::from_millis(300)).await;

    let started = Instant::now();
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .unwrap()
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(300));
    let (status, _, _) = split_response(&raw);
    assert_eq!(status, "HTTP/1.1 408 Request Timeout");

    shutdown.trigger();
}

#[tokio::test]
async fn stops_accepting_after_shutdown() {
    let dir = site();
    let (addr, shutdown) = start_server(vec![dir.path().to_path_buf()], Duration::from_secs(2)).await;

    shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn post_with_body_still_reads_405() {
    use tokio::io::AsyncWriteExt;

    let dir = site();
    let (addr, shutdown) = start_server(vec![dir.path().to_path_buf()], Duration::from_secs(2)).await;

    let body = vec![b'x'; 100_000];
    for _ in 0..5 {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"POST / HTTP/1.1\r\nContent-length: 100000\r\n\r\n")
            .await
            .unwrap();
        stream.write_all(&body).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut raw = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
            .await
            .unwrap()
            .unwrap();
        let (status, _, _) = split_response(&raw);
        assert_eq!(status, "HTTP/1.1 405 Method Not Allowed");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn index_found_in_later_directory() {
    let first = tempfile::tempdir().unwrap();
    let second = site();
    let (addr, shutdown) = start_server(
        vec![first.path().to_path_buf(), second.path().to_path_buf()],
        Duration::from_secs(2),
    )
    .await;

    let raw = exchange(addr, b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let (status, _, body) = split_response(&raw);
    assert_eq!(status, "HTTP/1.1 200 OK");
    assert_eq!(body, INDEX);

    shutdown.trigger();
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_file_is_403() {
    use std::os::unix::fs::PermissionsExt;

    let dir = site();
    let secret = dir.path().join("secret.txt");
    std::fs::write(&secret, b"hidden").unwrap();
    std::fs::set_permissions(&secret, std::fs::Permissions::from_mode(0o000)).unwrap();
    if std::fs::File::open(&secret).is_ok() {
        // Privileged users read regardless of mode.
        return;
    }

    let (addr, shutdown) = start_server(vec![dir.path().to_path_buf()], Duration::from_secs(2)).await;

    let raw = exchange(addr, b"GET /secret.txt HTTP/1.1\r\n\r\n").await;
    let (status, _, body) = split_response(&raw);
    assert_eq!(status, "HTTP/1.1 403 Forbidden");
    assert!(!body.windows(6).any(|w| w == b"hidden"));

    shutdown.trigger();
}
