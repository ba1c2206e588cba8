//! Base-protocol framing for LSP traffic.
//!
//! Every message travels as `Content-Length: N\r\n\r\n` followed by exactly
//! N bytes of UTF-8 JSON. [`MessageReader`] and [`MessageWriter`] handle the
//! two directions over any async byte stream.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single message body (8 MiB). A formatting response for
/// one document should never come close; anything larger means the stream
/// is corrupt.
const MAX_MESSAGE_BYTES: usize = 8 * 1024 * 1024;

/// Decodes framed JSON-RPC messages from an async byte stream.
pub struct MessageReader<R> {
    stream: BufReader<R>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Read one message. `Ok(None)` means the peer closed the stream
    /// cleanly (EOF on a frame boundary); EOF anywhere else is an error.
    pub async fn recv(&mut self) -> Result<Option<serde_json::Value>> {
        let Some(body_len) = self.read_headers().await? else {
            return Ok(None);
        };

        if body_len > MAX_MESSAGE_BYTES {
            bail!("Content-Length {body_len} exceeds limit of {MAX_MESSAGE_BYTES} bytes");
        }

        let mut body = vec![0u8; body_len];
        self.stream
            .read_exact(&mut body)
            .await
            .context("reading message body")?;

        serde_json::from_slice(&body)
            .context("decoding message body as JSON")
            .map(Some)
    }

    /// Consume header lines up to the blank separator and return the
    /// declared body length. `Ok(None)` only if EOF arrives before any
    /// header byte.
    async fn read_headers(&mut self) -> Result<Option<usize>> {
        let mut body_len = None;
        let mut line = String::new();
        let mut at_frame_boundary = true;

        loop {
            line.clear();
            let n = self
                .stream
                .read_line(&mut line)
                .await
                .context("reading header line")?;
            if n == 0 {
                if at_frame_boundary {
                    return Ok(None);
                }
                bail!("stream closed in the middle of a message header");
            }
            at_frame_boundary = false;

            let header = line.trim_end_matches(['\r', '\n']);
            if header.is_empty() {
                break;
            }

            // Header names are case-insensitive. Anything other than
            // Content-Length (e.g. Content-Type) is skipped.
            if let Some((name, value)) = header.split_once(':')
                && name.trim().eq_ignore_ascii_case("content-length")
            {
                let parsed: usize = value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid Content-Length value {:?}", value.trim()))?;
                body_len = Some(parsed);
            }
        }

        match body_len {
            Some(len) => Ok(Some(len)),
            None => bail!("message headers carried no Content-Length"),
        }
    }
}

/// Encodes framed JSON-RPC messages onto an async byte stream.
pub struct MessageWriter<W> {
    stream: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(stream: W) -> Self {
        Self { stream }
    }

    /// Frame and send one message. Content-Length counts UTF-8 bytes of
    /// the serialized body, not characters.
    pub async fn send(&mut self, message: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_string(message).context("encoding message body")?;
        let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        frame.extend_from_slice(body.as_bytes());

        self.stream
            .write_all(&frame)
            .await
            .context("writing message")?;
        self.stream.flush().await.context("flushing message")?;
        Ok(())
    }
}
