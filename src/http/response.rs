//! Response encoding.
//!
//! Every response carries `Date`, `Server`, `Connection: close`,
//! `Content-type` and `Content-length`, in that order.

use std::time::SystemTime;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

const CRLF: &str = "\r\n";

/// Reason phrase for the status codes this server emits.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        500 => "Internal Server Error",
        _ => "Unknown code",
    }
}

/// Minimal HTML page naming the status.
pub fn error_page(code: u16) -> String {
    format!(
        "<!DOCTYPE html><html><head></head><body>{}</body></html>",
        reason_phrase(code)
    )
}

/// Status line and fields of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub code: u16,
    pub server: String,
    pub content_type: String,
    pub content_length: u64,
}

impl ResponseHead {
    pub fn new(code: u16, server: impl Into<String>) -> Self {
        Self {
            code,
            server: server.into(),
            content_type: String::new(),
            content_length: 0,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn content_length(mut self, length: u64) -> Self {
        self.content_length = length;
        self
    }

    /// Serialize the head, blank line included.
    pub fn encode(&self, now: SystemTime) -> Vec<u8> {
        let mut head = String::with_capacity(160);
        head.push_str(&format!("HTTP/1.1 {} {}{CRLF}", self.code, reason_phrase(self.code)));
        head.push_str(&format!("Date: {}{CRLF}", httpdate::fmt_http_date(now)));
        head.push_str(&format!("Server: {}{CRLF}", self.server));
        head.push_str(&format!("Connection: close{CRLF}"));
        head.push_str(&format!("Content-type: {}{CRLF}", self.content_type));
        head.push_str(&format!("Content-length: {}{CRLF}", self.content_length));
        head.push_str(CRLF);
        head.into_bytes()
    }
}

/// Write `head` then stream `body` to `out`.
///
/// Returns the number of body bytes sent.
pub async fn send_response<W, B>(out: &mut W, head: &ResponseHead, body: &mut B) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
    B: AsyncRead + Unpin,
{
    out.write_all(&head.encode(SystemTime::now())).await?;
    let sent = tokio::io::copy(body, out).await?;
    out.flush().await?;
    Ok(sent)
}

/// Send the HTML error page for `code`.
pub async fn send_error<W>(out: &mut W, server: &str, code: u16) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let page = error_page(code);
    let head = ResponseHead::new(code, server)
        .content_type("text/html")
        .content_length(page.len() as u64);
    send_response(out, &head, &mut page.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn unknown_codes_have_a_phrase() {
        assert_eq!(reason_phrase(405), "Method Not Allowed");
        assert_eq!(reason_phrase(418), "Unknown code");
    }

    #[test]
    fn head_layout() {
        let head = ResponseHead::new(200, "WebSrv")
            .content_type("text/html")
            .content_length(12);
        let encoded = head.encode(UNIX_EPOCH + Duration::from_secs(784111777));

        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            "HTTP/1.1 200 OK\r\n\
             Date: Sun, 06 Nov 1994 08:49:37 GMT\r\n\
             Server: WebSrv\r\n\
             Connection: close\r\n\
             Content-type: text/html\r\n\
             Content-length: 12\r\n\
             \r\n"
        );
    }

    #[tokio::test]
    async fn error_response_counts_body_bytes_only() {
        let mut out = Vec::new();
        let sent = send_error(&mut out, "WebSrv", 404).await.unwrap();

        let page = error_page(404);
        assert_eq!(sent, page.len() as u64);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains(&format!("Content-length: {}\r\n", page.len())));
        assert!(text.ends_with(&format!("\r\n\r\n{page}")));
        assert!(page.contains("Not Found"));
    }
}
