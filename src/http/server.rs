//! Origin server connection worker.
//!
//! Per connection: `await-request → parsed → resolved → responded → closed`.
//! Each stage can exit early with an error response:
//! - header read timed out → 408
//! - header framing error → 400
//! - method other than `GET` → 405
//! - resource not found in any directory → 404
//! - resource found but not readable → 403
//!
//! Other read failures abandon the connection without a response. Every
//! connection ends with a half-close followed by a bounded drain of
//! whatever the client still sends.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::http::header::{HeaderError, HeaderParser};
use crate::http::response::{self, ResponseHead};
use crate::net::ConnectionWorker;
use crate::observability::{metrics, LogSinks};

/// Read bound applied to the request header.
pub const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Resource logged when the request never got far enough to name one.
const NO_RESOURCE: &str = "-";

/// Outcome of looking a resource up in the serve directories.
#[derive(Debug)]
enum Resolution {
    Found { path: PathBuf, file: File, len: u64 },
    NotFound,
    Forbidden,
}

/// Serves files from a list of directories, first match wins.
#[derive(Debug, Clone)]
pub struct OriginWorker {
    directories: Arc<Vec<PathBuf>>,
    sinks: LogSinks,
    read_timeout: Duration,
}

impl OriginWorker {
    pub fn new(directories: Vec<PathBuf>, sinks: LogSinks) -> Self {
        Self {
            directories: Arc::new(directories),
            sinks,
            read_timeout: HEADER_READ_TIMEOUT,
        }
    }

    /// Override the header read bound.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    async fn resolve(&self, resource: &str) -> Resolution {
        let Some(relative) = relative_path(resource) else {
            return Resolution::Forbidden;
        };

        let mut found = None;
        for dir in self.directories.iter() {
            let candidate = dir.join(&relative);
            self.sinks
                .debug(&format!("searching for {} in dir: {}", resource, dir.display()));
            let Ok(metadata) = tokio::fs::metadata(&candidate).await else {
                continue;
            };
            if metadata.is_dir() {
                let index = candidate.join("index.html");
                match tokio::fs::metadata(&index).await {
                    Ok(index_metadata) if index_metadata.is_file() => found = Some(index),
                    _ => continue,
                }
            } else {
                found = Some(candidate);
            }
            break;
        }

        let Some(path) = found else {
            return Resolution::NotFound;
        };

        match File::open(&path).await {
            Ok(file) => match file.metadata().await {
                Ok(metadata) if metadata.is_file() => Resolution::Found {
                    path,
                    file,
                    len: metadata.len(),
                },
                Ok(_) => Resolution::NotFound,
                Err(_) => Resolution::Forbidden,
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Resolution::NotFound,
            Err(_) => Resolution::Forbidden,
        }
    }

    async fn respond_error<W>(&self, out: &mut W, peer: SocketAddr, code: u16, resource: &str)
    where
        W: AsyncWrite + Unpin,
    {
        self.sinks.debug("Send error response");
        match response::send_error(out, self.sinks.server_name(), code).await {
            Ok(sent) => self.record(peer, code, sent, resource),
            Err(e) => self.sinks.error(&format!(
                "failed writing error message to client {}: {}",
                peer.ip(),
                e
            )),
        }
    }

    fn record(&self, peer: SocketAddr, code: u16, sent: u64, resource: &str) {
        metrics::record_response(code);
        self.sinks.served(&peer, code, sent, resource);
    }

    async fn serve_request<R, W>(&self, reader: &mut R, out: &mut W, peer: SocketAddr)
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.sinks.debug("Request parsing");
        let parser = HeaderParser::with_read_timeout(self.read_timeout);
        let request = match parser.parse(reader).await {
            Ok(request) => request,
            Err(HeaderError::Timeout) => {
                self.respond_error(out, peer, 408, NO_RESOURCE).await;
                return;
            }
            Err(HeaderError::Framing(e)) => {
                self.sinks.debug(&format!("malformed request: {e}"));
                self.respond_error(out, peer, 400, NO_RESOURCE).await;
                return;
            }
            Err(HeaderError::Io(e)) => {
                self.sinks
                    .error(&format!("Failed to read from client socket {}: {}", peer.ip(), e));
                return;
            }
        };
        self.sinks.debug("Request parsed");

        let resource = request.resource();
        if request.method() != "GET" {
            self.sinks.debug(&format!("method: {}", request.method()));
            self.respond_error(out, peer, 405, resource).await;
            return;
        }

        let (path, mut file, len) = match self.resolve(resource).await {
            Resolution::Found { path, file, len } => (path, file, len),
            Resolution::NotFound => {
                self.respond_error(out, peer, 404, resource).await;
                return;
            }
            Resolution::Forbidden => {
                self.respond_error(out, peer, 403, resource).await;
                return;
            }
        };

        self.sinks
            .debug(&format!("Build response with: {}", path.display()));
        let head = ResponseHead::new(200, self.sinks.server_name())
            .content_type(content_type(&path))
            .content_length(len);

        match response::send_response(out, &head, &mut file).await {
            Ok(sent) => self.record(peer, 200, sent, resource),
            Err(e) => self
                .sinks
                .error(&format!("failed writing to client {}: {}", peer.ip(), e)),
        }
    }

    /// Half-close, then discard what the client is still sending so the
    /// close does not reset the connection before the response is read.
    /// Bounded by the header read timeout.
    async fn linger<R, W>(&self, reader: &mut R, out: &mut W)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if out.shutdown().await.is_err() {
            return;
        }
        let discard = async {
            let mut sink = tokio::io::sink();
            let _ = tokio::io::copy(reader, &mut sink).await;
        };
        if tokio::time::timeout(self.read_timeout, discard).await.is_err() {
            self.sinks.debug("client still sending at close");
        }
    }
}

impl ConnectionWorker for OriginWorker {
    async fn handle(&self, mut stream: TcpStream, peer: SocketAddr) {
        self.sinks
            .debug(&format!("Starting handler for client: {}", peer.ip()));

        let (read_half, mut out) = stream.split();
        let mut reader = BufReader::new(read_half);

        self.serve_request(&mut reader, &mut out, peer).await;
        self.linger(&mut reader, &mut out).await;
    }
}

/// Map a request resource onto a path relative to a serve directory.
///
/// Returns `None` for resources that try to leave the directory.
fn relative_path(resource: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(resource.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(relative)
}

/// Content type by file extension; empty when unknown.
fn content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.to_string())
        .unwrap_or_default()
}
