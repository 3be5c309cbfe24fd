//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for runtime settings.  It is
//! populated from CLI arguments in `main.rs` or from [`Default`] in tests.
//! Nothing in this module reads the environment.

use std::net::SocketAddr;
use std::time::Duration;

use picam_core::protocol::DEFAULT_MAX_FRAME_LEN;

/// Default TCP port of the camera service.
pub const DEFAULT_PORT: u16 = 8090;

/// Default number of blocking worker threads for camera and encoding work.
pub const DEFAULT_CAPTURE_WORKERS: usize = 4;

/// All runtime configuration for the camera server.
///
/// # Example
///
/// ```rust
/// use picam_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8090);
/// assert!(cfg.lock_timeout.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address and port the listener binds to.
    pub bind_addr: SocketAddr,

    /// Largest accepted netstring payload in bytes.  A peer that announces a
    /// bigger frame is disconnected.
    pub max_frame_len: usize,

    /// Upper bound on blocking worker threads (camera I/O, base64 encoding).
    pub capture_workers: usize,

    /// How long an `IMAGE` request may wait for the camera lock.  `None` waits
    /// forever.
    pub lock_timeout: Option<Duration>,

    /// Artificial exposure time added by the simulated camera to each capture.
    pub sim_delay: Duration,
}

impl Default for ServerConfig {
    /// | Field           | Default        |
    /// |-----------------|----------------|
    /// | bind_addr       | `0.0.0.0:8090` |
    /// | max_frame_len   | 32 MiB         |
    /// | capture_workers | 4              |
    /// | lock_timeout    | none           |
    /// | sim_delay       | 0              |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            capture_workers: DEFAULT_CAPTURE_WORKERS,
            lock_timeout: None,
            sim_delay: Duration::ZERO,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
