//! Listener and session factory: accept loop and per-connection task spawning.
//!
//! This module is responsible for:
//!
//! 1. Binding the TCP listener on the configured address.
//! 2. Accepting incoming connections.
//! 3. Asking the [`SessionFactory`] for a [`Session`] per connection and
//!    running it in its own task, inside a `session` tracing span.
//! 4. Stopping when the shared `running` flag is cleared.
//!
//! The factory is shared by every connection.  It holds the dispatcher (and,
//! through it, the camera gate) plus the active-connection counter updated by
//! the open/close hooks.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::{error, info, info_span, warn, Instrument};

use picam_core::{CameraDriver, Greeting};

use crate::application::{default_dispatcher, CameraGate, Dispatcher};
use crate::domain::ServerConfig;
use crate::infrastructure::session::Session;
use crate::{SERVER_NAME, SERVER_VERSION};

/// How often the accept loop checks the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

// ── Session factory ───────────────────────────────────────────────────────────

/// Builds sessions and tracks how many are alive.
#[derive(Debug)]
pub struct SessionFactory {
    dispatcher: Arc<Dispatcher>,
    greeting: Greeting,
    max_frame_len: usize,
    active: AtomicUsize,
    accepted: AtomicU64,
}

impl SessionFactory {
    /// Creates a factory whose sessions greet with this crate's name and
    /// version.
    pub fn new(dispatcher: Arc<Dispatcher>, max_frame_len: usize) -> Self {
        Self::with_greeting(
            dispatcher,
            Greeting::from_version_str(SERVER_NAME, SERVER_VERSION),
            max_frame_len,
        )
    }

    /// Creates a factory with an explicit greeting.
    pub fn with_greeting(
        dispatcher: Arc<Dispatcher>,
        greeting: Greeting,
        max_frame_len: usize,
    ) -> Self {
        Self {
            dispatcher,
            greeting,
            max_frame_len,
            active: AtomicUsize::new(0),
            accepted: AtomicU64::new(0),
        }
    }

    /// Builds the session for an accepted connection.
    pub fn build(&self, stream: TcpStream, peer: SocketAddr) -> Session<OwnedReadHalf, OwnedWriteHalf> {
        Session::from_tcp(
            stream,
            peer,
            Arc::clone(&self.dispatcher),
            self.greeting.clone(),
            self.max_frame_len,
        )
    }

    /// Hook run when a connection is accepted.
    pub fn connection_opened(&self, peer: SocketAddr) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        let active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        info!(%peer, active, "connection opened");
    }

    /// Hook run when a connection's session has ended.
    pub fn connection_closed(&self, peer: SocketAddr) {
        let active = self.active.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        info!(%peer, active, "connection closed");
    }

    /// Connections currently open.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Connections accepted since start-up.
    pub fn accepted_connections(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// A bound TCP listener that spawns one session task per connection.
pub struct Listener {
    inner: TcpListener,
    factory: Arc<SessionFactory>,
}

impl Listener {
    /// Binds `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is in use or cannot be bound.
    pub async fn bind(addr: SocketAddr, factory: Arc<SessionFactory>) -> anyhow::Result<Self> {
        let inner = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind camera listener on {addr}"))?;
        Ok(Self { inner, factory })
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.inner
            .local_addr()
            .context("failed to read listener address")
    }

    /// Accepts connections until `running` is cleared.
    ///
    /// Sessions already running are not interrupted; they end when their
    /// peers disconnect or the runtime shuts down.
    pub async fn serve(self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        info!(addr = %self.local_addr()?, "camera server listening");

        while running.load(Ordering::Relaxed) {
            // A short timeout lets the loop notice the shutdown flag even when
            // nobody is connecting.
            let (stream, peer) = match timeout(SHUTDOWN_POLL, self.inner.accept()).await {
                Ok(Ok(accepted)) => accepted,
                Ok(Err(e)) => {
                    // Transient (e.g. out of file descriptors): keep serving.
                    error!("accept error: {e}");
                    continue;
                }
                Err(_) => continue,
            };

            if let Err(e) = stream.set_nodelay(true) {
                warn!(%peer, "failed to set TCP_NODELAY: {e}");
            }

            let factory = Arc::clone(&self.factory);
            let mut session = factory.build(stream, peer);
            let span = info_span!("session", %peer, id = %session.id());

            tokio::spawn(
                async move {
                    factory.connection_opened(peer);
                    if let Err(e) = session.run().await {
                        warn!("session ended with error: {e:#}");
                    }
                    factory.connection_closed(peer);
                }
                .instrument(span),
            );
        }

        info!("shutdown flag set; stopping accept loop");
        Ok(())
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

/// Builds the camera gate and dispatcher, binds, and serves until `running`
/// is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    config: ServerConfig,
    driver: Box<dyn CameraDriver>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = bind_server(&config, driver).await?;
    listener.serve(running).await
}

/// Builds everything [`run_server`] needs and binds, without serving yet.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn bind_server(
    config: &ServerConfig,
    driver: Box<dyn CameraDriver>,
) -> anyhow::Result<Listener> {
    let gate = Arc::new(CameraGate::new(driver, config.lock_timeout));
    let dispatcher = Arc::new(default_dispatcher(gate));
    let factory = Arc::new(SessionFactory::new(dispatcher, config.max_frame_len));
    Listener::bind(config.bind_addr, factory).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
