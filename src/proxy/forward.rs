//! One relay direction.
//!
//! A [`ForwardTask`] copies bytes from a source to a destination until
//! the source reaches end-of-stream or an I/O fault occurs. It always
//! produces a [`RelayResult`]; faults are recorded, never returned as
//! errors, so a failing direction cannot disturb its sibling.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Which way bytes flow through a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToUpstream => "client to server",
            Direction::UpstreamToClient => "server to client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one relay direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResult {
    pub direction: Direction,
    pub from: SocketAddr,
    pub to: SocketAddr,
    /// Bytes accepted by the destination, up to the fault if there was one.
    pub bytes: u64,
    pub error: Option<String>,
}

impl RelayResult {
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// Copy job for a single direction.
#[derive(Debug, Clone, Copy)]
pub struct ForwardTask {
    pub direction: Direction,
    pub from: SocketAddr,
    pub to: SocketAddr,
    pub buffer_size: usize,
}

impl ForwardTask {
    /// Run the copy to completion.
    ///
    /// Every chunk read is written and flushed before the next read. On
    /// end-of-stream the destination's write side is shut down so the far
    /// peer sees the half-close.
    pub async fn run<R, W>(self, reader: &mut R, writer: &mut W) -> RelayResult
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; self.buffer_size.max(1)];
        let mut bytes = 0u64;

        let error = loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => {
                    if let Err(e) = writer.shutdown().await {
                        tracing::debug!(direction = %self.direction, error = %e, "Half-close not delivered");
                    }
                    break None;
                }
                Ok(n) => n,
                Err(e) => break Some(e),
            };

            if let Err(e) = write_chunk(writer, &buf[..n], &mut bytes).await {
                break Some(e);
            }
            if let Err(e) = writer.flush().await {
                break Some(e);
            }
        };

        RelayResult {
            direction: self.direction,
            from: self.from,
            to: self.to,
            bytes,
            error: error.map(|e| {
                format!(
                    "{} failed forwarding {} to {} after {} bytes: {}",
                    self.direction, self.from, self.to, bytes, e
                )
            }),
        }
    }
}

/// Write all of `chunk`, adding every accepted byte to `bytes` as it goes.
async fn write_chunk<W>(writer: &mut W, mut chunk: &[u8], bytes: &mut u64) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    while !chunk.is_empty() {
        let n = writer.write(chunk).await?;
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        *bytes += n as u64;
        chunk = &chunk[n..];
    }
    Ok(())
}

/// Copy `reader` into `writer` as one relay direction.
pub async fn forward<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
    direction: Direction,
    from: SocketAddr,
    to: SocketAddr,
) -> RelayResult
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    ForwardTask {
        direction,
        from,
        to,
        buffer_size,
    }
    .run(reader, writer)
    .await
}
