//! Request header tokenizer.
//!
//! Reads `METHOD SP RESOURCE SP VERSION CRLF`, then `Name: Value CRLF`
//! lines until a bare `CRLF`. Lines must end in exactly CR LF. Nothing
//! after the blank line is consumed.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const START_LINE_KEYS: [&str; 3] = ["head1", "head2", "head3"];

/// Why a header could not be framed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    #[error("malformed start line")]
    MalformedStartLine,
    #[error("invalid field format")]
    InvalidFieldFormat,
    #[error("incorrect line terminating byte: {0:#04x}")]
    BadLineTerminator(u8),
    #[error("stream ended before the header was complete (in start line: {in_start_line})")]
    UnexpectedEof { in_start_line: bool },
}

/// Error type for header parsing.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// No byte arrived within the read timeout.
    #[error("timed out waiting for request header")]
    Timeout,
    #[error("failed to read request header: {0}")]
    Io(#[from] io::Error),
    #[error("malformed request header: {0}")]
    Framing(#[from] FramingError),
}

/// Parsed header fields.
///
/// Field names are stored lower-cased. The three start-line tokens live
/// under synthetic keys and are reached through [`method`](Self::method),
/// [`resource`](Self::resource) and [`version`](Self::version).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    fields: HashMap<String, String>,
}

impl HeaderFields {
    pub fn method(&self) -> &str {
        self.raw(START_LINE_KEYS[0]).unwrap_or_default()
    }

    pub fn resource(&self) -> &str {
        self.raw(START_LINE_KEYS[1]).unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.raw(START_LINE_KEYS[2]).unwrap_or_default()
    }

    /// Look up a field by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.raw(&name.to_ascii_lowercase())
    }

    /// Number of field lines stored (start-line tokens excluded).
    pub fn field_count(&self) -> usize {
        self.fields
            .keys()
            .filter(|key| !START_LINE_KEYS.contains(&key.as_str()))
            .count()
    }

    fn raw(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    fn set_start_line(&mut self, line: &str) -> Result<(), FramingError> {
        let tokens: Vec<&str> = line.splitn(3, ' ').collect();
        if tokens.len() != 3 {
            return Err(FramingError::MalformedStartLine);
        }
        for (key, token) in START_LINE_KEYS.iter().zip(tokens) {
            self.fields.insert((*key).to_string(), token.to_string());
        }
        Ok(())
    }

    fn add_field(&mut self, line: &str) -> Result<(), FramingError> {
        let (name, value) = line.split_once(": ").ok_or(FramingError::InvalidFieldFormat)?;
        if value.contains(": ") {
            return Err(FramingError::InvalidFieldFormat);
        }
        self.fields.insert(name.to_lowercase(), value.to_string());
        Ok(())
    }
}

/// Byte-stream header tokenizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderParser {
    read_timeout: Option<Duration>,
}

impl HeaderParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every blocking read by `timeout`. Bytes already buffered are
    /// consumed without waiting.
    pub fn with_read_timeout(timeout: Duration) -> Self {
        Self {
            read_timeout: Some(timeout),
        }
    }

    /// Parse one header from `reader`.
    pub async fn parse<R>(&self, reader: &mut R) -> Result<HeaderFields, HeaderError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut fields = HeaderFields::default();

        let start = self.read_line(reader, true).await?;
        fields.set_start_line(&start)?;

        loop {
            let line = self.read_line(reader, false).await?;
            if line.is_empty() {
                return Ok(fields);
            }
            fields.add_field(&line)?;
        }
    }

    async fn read_line<R>(&self, reader: &mut R, in_start_line: bool) -> Result<String, HeaderError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = Vec::new();
        loop {
            let byte = self
                .next_byte(reader)
                .await?
                .ok_or(FramingError::UnexpectedEof { in_start_line })?;
            match byte {
                b'\r' => break,
                b'\n' => return Err(FramingError::BadLineTerminator(byte).into()),
                _ => line.push(byte),
            }
        }

        match self.next_byte(reader).await? {
            Some(b'\n') => Ok(String::from_utf8_lossy(&line).into_owned()),
            Some(other) => Err(FramingError::BadLineTerminator(other).into()),
            None => Err(FramingError::UnexpectedEof { in_start_line }.into()),
        }
    }

    async fn next_byte<R>(&self, reader: &mut R) -> Result<Option<u8>, HeaderError>
    where
        R: AsyncBufRead + Unpin,
    {
        let available = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, reader.fill_buf())
                .await
                .map_err(|_| HeaderError::Timeout)??,
            None => reader.fill_buf().await?,
        };
        let Some(&byte) = available.first() else {
            return Ok(None);
        };
        reader.consume(1);
        Ok(Some(byte))
    }
}
