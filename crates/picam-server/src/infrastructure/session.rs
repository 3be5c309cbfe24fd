//! Connection Session: the per-connection state machine.
//!
//! ```text
//!   accept
//!     │
//!     ▼
//!   Open ──greeting sent──► Idle ◄──────────────┐
//!                             │                 │
//!                       frame arrives     response sent
//!                             │           (or frame dropped)
//!                             ▼                 │
//!                        Processing ────────────┘
//!
//!   EOF / read error / framing error / write failure ──► Closed
//! ```
//!
//! A session answers frames strictly in the order they arrive: it does not
//! read the next frame until the current one has been answered or dropped.
//! Other sessions keep running while this one awaits the camera.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use picam_core::protocol::encode;
use picam_core::{CodecError, Greeting, Response};

use crate::application::{process_frame, Dispatcher};
use crate::infrastructure::framed::{FramedError, FramedReader, FramedWriter};

/// Lifecycle states of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Accepted; the greeting has not been sent yet.
    Open,
    /// Waiting for the next frame.
    Idle,
    /// A frame is going through the pipeline.
    Processing,
    /// Terminal.  Nothing more is read or written.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Reasons a session ends abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The greeting could not be serialized.
    #[error("failed to encode greeting: {0}")]
    Greeting(#[source] CodecError),

    /// Reading or framing failed.
    #[error(transparent)]
    Read(#[from] FramedError),

    /// The peer stopped accepting data.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// One client connection.
pub struct Session<R, W> {
    id: Uuid,
    peer: SocketAddr,
    state: SessionState,
    reader: FramedReader<R>,
    writer: FramedWriter<W>,
    dispatcher: Arc<Dispatcher>,
    greeting: Greeting,
    frames_handled: u64,
}

impl Session<OwnedReadHalf, OwnedWriteHalf> {
    /// Builds a session over an accepted TCP stream.
    pub fn from_tcp(
        stream: TcpStream,
        peer: SocketAddr,
        dispatcher: Arc<Dispatcher>,
        greeting: Greeting,
        max_frame_len: usize,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self::new(read_half, write_half, peer, dispatcher, greeting, max_frame_len)
    }
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Builds a session over any reader/writer pair.
    pub fn new(
        reader: R,
        writer: W,
        peer: SocketAddr,
        dispatcher: Arc<Dispatcher>,
        greeting: Greeting,
        max_frame_len: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            state: SessionState::Open,
            reader: FramedReader::new(reader, max_frame_len),
            writer: FramedWriter::new(writer),
            dispatcher,
            greeting,
            frames_handled: 0,
        }
    }

    /// Unique identifier used in log spans.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Frames processed so far, including dropped ones.
    pub fn frames_handled(&self) -> u64 {
        self.frames_handled
    }

    /// Runs the session until the peer disconnects or a fatal error occurs.
    ///
    /// The session is always `Closed` when this returns.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] for abnormal termination; a clean EOF
    /// between frames is `Ok`.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        let result = self.drive().await;
        self.close().await;
        result
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        let greeting = encode(&self.greeting).map_err(SessionError::Greeting)?;
        self.writer
            .write_frame(&greeting)
            .await
            .map_err(SessionError::Write)?;
        self.transition(SessionState::Idle);

        while let Some(frame) = self.reader.read_frame().await? {
            self.transition(SessionState::Processing);
            if let Some(response) = process_frame(&self.dispatcher, &frame).await {
                self.send_response(&response).await?;
            }
            self.frames_handled += 1;
            self.transition(SessionState::Idle);
        }

        debug!(frames = self.frames_handled, "peer closed the connection");
        Ok(())
    }

    async fn send_response(&mut self, response: &Response) -> Result<(), SessionError> {
        let bytes = match encode(response) {
            Ok(bytes) => bytes,
            Err(e) => {
                // Internal fault: report it but keep the connection.
                error!(command = response.command(), "failed to encode response: {e}");
                return Ok(());
            }
        };
        self.writer
            .write_frame(&bytes)
            .await
            .map_err(SessionError::Write)
    }

    async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.transition(SessionState::Closed);
        self.reader.release();
        // The peer may already be gone; nothing useful to do with the error.
        let _ = self.writer.shutdown().await;
        info!(frames = self.frames_handled, "session closed");
    }

    fn transition(&mut self, next: SessionState) {
        trace!(from = %self.state, to = %next, "session state");
        self.state = next;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::PingHandler;
    use picam_core::protocol::encode_netstring;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio_test::io::Builder;

    const GREETING: &[u8] = br#"41:{"name":"picam-server","version":[0,1,0]},"#;

    fn dispatcher() -> Arc<Dispatcher> {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("PING", Arc::new(PingHandler));
        Arc::new(dispatcher)
    }

    fn greeting() -> Greeting {
        Greeting::new("picam-server", [0, 1, 0])
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_session_greets_then_answers_ping() {
        // Arrange
        let reader = Builder::new().read(b"18:{\"command\":\"ping\"},").build();
        let writer = Builder::new()
            .write(GREETING)
            .write(br#"35:{"command":"PING","payload":"PONG"},"#)
            .build();
        let mut session = Session::new(reader, writer, peer(), dispatcher(), greeting(), 1024);
        assert_eq!(session.state(), SessionState::Open);

        // Act
        session.run().await.unwrap();

        // Assert
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.frames_handled(), 1);
    }

    #[tokio::test]
    async fn test_missing_command_gets_no_reply_and_session_continues() {
        // Arrange: the first frame is dropped, the second answered.
        let reader = Builder::new()
            .read(b"13:{\"foo\":\"bar\"},")
            .read(b"18:{\"command\":\"ping\"},")
            .build();
        let writer = Builder::new()
            .write(GREETING)
            .write(br#"35:{"command":"PING","payload":"PONG"},"#)
            .build();
        let mut session = Session::new(reader, writer, peer(), dispatcher(), greeting(), 1024);

        // Act
        session.run().await.unwrap();

        // Assert
        assert_eq!(session.frames_handled(), 2);
    }

    #[tokio::test]
    async fn test_framing_error_closes_session() {
        let reader = Builder::new().read(b"x:").build();
        let writer = Builder::new().write(GREETING).build();
        let mut session = Session::new(reader, writer, peer(), dispatcher(), greeting(), 1024);

        let result = session.run().await;

        assert!(matches!(result, Err(SessionError::Read(FramedError::Frame(_)))));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_write_failure_closes_session() {
        let reader = Builder::new().build();
        let writer = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let mut session = Session::new(reader, writer, peer(), dispatcher(), greeting(), 1024);

        let result = session.run().await;

        assert!(matches!(result, Err(SessionError::Write(_))));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_responses_follow_request_order() {
        // Arrange: three pipelined requests in a single write.
        let (client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let mut session = Session::new(
            server_read,
            server_write,
            peer(),
            dispatcher(),
            greeting(),
            1024,
        );
        let task = tokio::spawn(async move { session.run().await });
        let (mut client_read, mut client_write) = tokio::io::split(client);

        let mut wire = Vec::new();
        for payload in [
            &br#"{"command":"ping"}"#[..],
            br#"{"command":"nope"}"#,
            br#"{"command":"PING"}"#,
        ] {
            wire.extend(encode_netstring(payload));
        }

        // Act
        client_write.write_all(&wire).await.unwrap();
        client_write.shutdown().await.unwrap();
        let mut received = Vec::new();
        client_read.read_to_end(&mut received).await.unwrap();
        task.await.unwrap().unwrap();

        // Assert
        let mut expected = GREETING.to_vec();
        expected.extend_from_slice(br#"35:{"command":"PING","payload":"PONG"},"#);
        expected.extend_from_slice(br#"37:{"command":"NOPE","error":{"code":2}},"#);
        expected.extend_from_slice(br#"35:{"command":"PING","payload":"PONG"},"#);
        assert_eq!(received, expected);
    }

    #[test]
    fn test_state_display_names() {
        assert_eq!(SessionState::Processing.to_string(), "processing");
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }
}
