//! Framed I/O for IMAP protocol.
//!
//! IMAP uses CRLF-terminated lines which may announce literals (`{n}\r\n`
//! followed by exactly `n` octets). A whole message fetched with `RFC822`
//! arrives as one such literal.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Maximum line length (outside of literals).
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Maximum literal size; larger messages are refused rather than buffered.
const MAX_LITERAL_SIZE: usize = 256 * 1024 * 1024;

/// Framed connection for IMAP protocol.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    read_timeout: Option<Duration>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream without a read timeout.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            read_timeout: None,
        }
    }

    /// Sets the maximum time to wait for data on any single read.
    ///
    /// A large literal may take longer than this in total, as long as the
    /// server keeps sending.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Reads one complete response, including any embedded literals.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = BytesMut::new();

        loop {
            let line_start = response.len();
            self.read_line(&mut response).await?;

            let Some(literal_len) = parse_literal_length(&response[line_start..]) else {
                break;
            };
            if literal_len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {literal_len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }

            let mut filled = response.len();
            let end = filled + literal_len;
            response.resize(end, 0);
            while filled < end {
                let buf = self.fill().await?;
                let n = buf.len().min(end - filled);
                response[filled..filled + n].copy_from_slice(&buf[..n]);
                self.reader.consume(n);
                filled += n;
            }
        }

        Ok(response.to_vec())
    }

    /// Appends one CRLF-terminated line to `out`.
    async fn read_line(&mut self, out: &mut BytesMut) -> Result<()> {
        let start = out.len();

        loop {
            let buf = self.fill().await?;

            // A CR may have been the last byte of the previous chunk.
            let pending_cr = out.len() > start && out.last() == Some(&b'\r');
            if pending_cr && buf[0] == b'\n' {
                out.extend_from_slice(&buf[..1]);
                self.reader.consume(1);
                return Ok(());
            }

            if let Some(pos) = find_crlf(buf) {
                out.extend_from_slice(&buf[..pos + 2]);
                self.reader.consume(pos + 2);
                return Ok(());
            }

            let len = buf.len();
            out.extend_from_slice(buf);
            self.reader.consume(len);

            if out.len() - start > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }

    /// Waits for buffered data, within the read timeout.
    async fn fill(&mut self) -> Result<&[u8]> {
        let read = self.reader.fill_buf();
        let buf = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| Error::Timeout(limit))??,
            None => read.await?,
        };
        if buf.is_empty() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }
        Ok(buf)
    }

    /// Writes a serialized command and flushes it.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Any buffered, unread data is lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses a literal length from the end of a line.
///
/// Matches `{123}\r\n` or the non-synchronizing `{123+}\r\n`.
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;

    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
