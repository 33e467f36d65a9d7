//! Minimal passive-mode FTP retrieval.
//!
//! Session: greeting `220`, `USER`/`PASS`, `TYPE I`, `PASV`, `RETR`,
//! transfer on the data connection, completion `226`/`250`, `QUIT`.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use url::Url;

use crate::client::ClientError;

pub const DEFAULT_PORT: u16 = 21;

/// A complete (possibly multi-line) server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    fn into_error(self) -> ClientError {
        ClientError::Ftp {
            code: self.code,
            message: self.text,
        }
    }
}

/// Retrieve the file named by `url` into `out`.
pub async fn fetch<W>(url: &Url, out: &mut W) -> Result<u64, ClientError>
where
    W: AsyncWrite + Unpin,
{
    let host = url
        .host_str()
        .ok_or_else(|| ClientError::InvalidUrl(url.to_string()))?
        .to_string();
    let port = url.port().unwrap_or(DEFAULT_PORT);
    let path = url.path().trim_start_matches('/');
    if path.is_empty() {
        return Err(ClientError::InvalidUrl(url.to_string()));
    }

    let stream = TcpStream::connect((host.as_str(), port))
        .await
        .map_err(|source| ClientError::Connect {
            host: host.clone(),
            source,
        })?;
    let mut control = BufReader::new(stream);

    expect_reply(read_reply(&mut control).await?, &[220])?;
    login(&mut control, url).await?;
    expect_reply(command(&mut control, "TYPE I").await?, &[200])?;

    let pasv = expect_reply(command(&mut control, "PASV").await?, &[227])?;
    let data_addr = parse_pasv(&pasv.text).ok_or_else(|| pasv.clone().into_error())?;
    let mut data = TcpStream::connect(data_addr)
        .await
        .map_err(|source| ClientError::Connect {
            host: data_addr.to_string(),
            source,
        })?;

    expect_reply(command(&mut control, &format!("RETR {path}")).await?, &[125, 150])?;

    let written = copy_data(&mut data, out).await?;
    drop(data);

    expect_reply(read_reply(&mut control).await?, &[226, 250])?;
    let _ = command(&mut control, "QUIT").await;

    Ok(written)
}

async fn login<S>(control: &mut S, url: &Url) -> Result<(), ClientError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let user = match url.username() {
        "" => "anonymous",
        user => user,
    };
    let reply = expect_reply(command(control, &format!("USER {user}")).await?, &[230, 331])?;
    if reply.code == 331 {
        let password = url.password().unwrap_or("anonymous@");
        expect_reply(command(control, &format!("PASS {password}")).await?, &[202, 230])?;
    }
    Ok(())
}

async fn copy_data<W>(data: &mut TcpStream, out: &mut W) -> Result<u64, ClientError>
where
    W: AsyncWrite + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut buf = vec![0u8; 16 * 1024];
    let mut written = 0u64;
    loop {
        let n = data.read(&mut buf).await.map_err(ClientError::Read)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).await.map_err(ClientError::Output)?;
        written += n as u64;
    }
    out.flush().await.map_err(ClientError::Output)?;
    Ok(written)
}

fn expect_reply(reply: Reply, accepted: &[u16]) -> Result<Reply, ClientError> {
    if accepted.contains(&reply.code) {
        Ok(reply)
    } else {
        Err(reply.into_error())
    }
}

/// Send one command line and read the reply.
pub async fn command<S>(control: &mut S, line: &str) -> Result<Reply, ClientError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let verb = line.split(' ').next().unwrap_or_default();
    tracing::debug!(command = verb, "FTP command");

    control
        .write_all(format!("{line}\r\n").as_bytes())
        .await
        .map_err(ClientError::Read)?;
    control.flush().await.map_err(ClientError::Read)?;
    read_reply(control).await
}

/// Read a reply, joining the lines of a multi-line (`123-`) reply.
pub async fn read_reply<R>(control: &mut R) -> Result<Reply, ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let first = read_line(control).await?;
    let code = reply_code(&first).ok_or_else(|| malformed(&first))?;

    let mut text = first.get(4..).unwrap_or_default().to_string();
    if first.as_bytes().get(3) == Some(&b'-') {
        let last = format!("{code} ");
        loop {
            let line = read_line(control).await?;
            text.push('\n');
            if let Some(rest) = line.strip_prefix(&last) {
                text.push_str(rest);
                break;
            }
            text.push_str(&line);
        }
    }

    Ok(Reply { code, text })
}

async fn read_line<R>(control: &mut R) -> Result<String, ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = control.read_line(&mut line).await.map_err(ClientError::Read)?;
    if n == 0 {
        return Err(ClientError::Read(std::io::ErrorKind::UnexpectedEof.into()));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn reply_code(line: &str) -> Option<u16> {
    let digits = line.get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn malformed(line: &str) -> ClientError {
    ClientError::Ftp {
        code: 0,
        message: format!("malformed reply: {line}"),
    }
}

/// Extract the data address from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` text.
pub fn parse_pasv(text: &str) -> Option<SocketAddr> {
    let start = text.find('(')? + 1;
    let end = start + text[start..].find(')')?;
    let numbers = text[start..end]
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    let [a, b, c, d, hi, lo] = numbers.as_slice() else {
        return None;
    };
    let ip = Ipv4Addr::new(*a, *b, *c, *d);
    let port = u16::from(*hi) << 8 | u16::from(*lo);
    Some(SocketAddr::V4(SocketAddrV4::new(ip, port)))
}
