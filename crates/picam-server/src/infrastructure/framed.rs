//! Async netstring reader and writer.
//!
//! [`FramedReader`] wraps any `AsyncRead` (normally the read half of a
//! `TcpStream`) around a [`NetstringDecoder`]; [`FramedWriter`] wraps any
//! `AsyncWrite` and sends one complete netstring per call.
//!
//! Both are generic so tests can drive them with `tokio_test::io::Mock`
//! instead of a real socket.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use picam_core::protocol::encode_netstring;
use picam_core::{FrameError, NetstringDecoder};

/// Size of each socket read.
const READ_CHUNK: usize = 8 * 1024;

/// Errors that end a framed connection.
#[derive(Debug, Error)]
pub enum FramedError {
    /// The peer sent bytes that are not a valid netstring.
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    /// The peer closed the connection part-way through a frame.
    #[error("connection closed mid-frame with {buffered} bytes buffered")]
    Truncated { buffered: usize },

    /// The socket read failed.
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Reads complete netstring payloads from a byte stream.
pub struct FramedReader<R> {
    inner: R,
    decoder: NetstringDecoder,
    chunk: Box<[u8]>,
}

impl<R: AsyncRead + Unpin> FramedReader<R> {
    /// Wraps `inner`, rejecting frames larger than `max_frame_len`.
    pub fn new(inner: R, max_frame_len: usize) -> Self {
        Self {
            inner,
            decoder: NetstringDecoder::new(max_frame_len),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
        }
    }

    /// Waits for the next complete frame.
    ///
    /// Returns `Ok(None)` on a clean end of stream (EOF between frames).
    ///
    /// # Errors
    ///
    /// Any [`FramedError`] is fatal for the connection.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, FramedError> {
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                trace!(len = frame.len(), "frame received");
                return Ok(Some(frame));
            }

            let n = self.inner.read(&mut self.chunk).await?;
            if n == 0 {
                let buffered = self.decoder.buffered_len();
                return if buffered == 0 {
                    Ok(None)
                } else {
                    Err(FramedError::Truncated { buffered })
                };
            }
            self.decoder.extend(&self.chunk[..n]);
        }
    }

    /// Bytes of a partial frame currently held.
    pub fn buffered_len(&self) -> usize {
        self.decoder.buffered_len()
    }

    /// Frees the partial-frame buffer.
    pub fn release(&mut self) {
        self.decoder.clear();
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Writes netstring frames to a byte stream.
pub struct FramedWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FramedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Frames `payload`, writes it in full, and flushes.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the peer has gone away.
    pub async fn write_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        let frame = encode_netstring(payload);
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        trace!(len = payload.len(), "frame sent");
        Ok(())
    }

    /// Shuts down the write direction.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
