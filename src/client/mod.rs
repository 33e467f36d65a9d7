//! Resource fetching client.
//!
//! `http` and `https` URLs go through `reqwest`; `ftp` URLs through a
//! small passive-mode client. Bodies are copied to the output unchanged.

pub mod ftp;
pub mod http;

use std::io;

use tokio::io::AsyncWrite;
use url::Url;

/// Error type for client requests.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("protocol not supported by client: {0}")]
    UnsupportedScheme(String),
    #[error("url is malformed: {0}")]
    InvalidUrl(String),
    #[error("failed to connect to host {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{code} {reason}")]
    Status { code: u16, reason: String },
    #[error("ftp server replied {code} {message}")]
    Ftp { code: u16, message: String },
    #[error("failed reading from host: {0}")]
    Read(#[source] io::Error),
    #[error("failed writing output: {0}")]
    Output(#[source] io::Error),
}

impl ClientError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            ClientError::Connect { .. } => 2,
            ClientError::Http(e) if e.is_connect() => 2,
            ClientError::UnsupportedScheme(_)
            | ClientError::InvalidUrl(_)
            | ClientError::Status { .. }
            | ClientError::Ftp { .. } => 3,
            ClientError::Http(_) | ClientError::Read(_) => 5,
            ClientError::Output(_) => 6,
        }
    }
}

/// Fetch `url` and copy its body to `out`.
///
/// Returns the number of body bytes written.
pub async fn fetch<W>(url: &Url, out: &mut W) -> Result<u64, ClientError>
where
    W: AsyncWrite + Unpin,
{
    tracing::debug!(url = %url, "Fetching");
    match url.scheme() {
        "http" | "https" => http::fetch(url, out).await,
        "ftp" => ftp::fetch(url, out).await,
        other => Err(ClientError::UnsupportedScheme(other.to_string())),
    }
}
