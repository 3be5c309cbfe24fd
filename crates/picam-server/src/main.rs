//! picam camera control server: entry point.
//!
//! Accepts TCP connections and answers netstring-framed JSON commands:
//!
//! ```text
//! → 18:{"command":"ping"},
//! ← 35:{"command":"PING","payload":"PONG"},
//! ```
//!
//! # Usage
//!
//! ```text
//! picam-server [OPTIONS]
//!
//! Options:
//!   --port              <PORT>   TCP port to listen on [default: 8090]
//!   --bind              <ADDR>   Interface to bind [default: 0.0.0.0]
//!   --max-frame-bytes   <BYTES>  Largest accepted request frame [default: 33554432]
//!   --workers           <N>      Blocking worker threads [default: 4]
//!   --lock-timeout-secs <SECS>   Camera lock wait limit, 0 = forever [default: 0]
//!   --sim-delay-ms      <MS>     Simulated exposure time [default: 0]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                  | Default    | Description                 |
//! |---------------------------|------------|-----------------------------|
//! | `PICAM_PORT`              | `8090`     | TCP listener port           |
//! | `PICAM_BIND`              | `0.0.0.0`  | Bind interface              |
//! | `PICAM_MAX_FRAME_BYTES`   | 32 MiB     | Frame size limit            |
//! | `PICAM_WORKERS`           | `4`        | Blocking worker threads     |
//! | `PICAM_LOCK_TIMEOUT_SECS` | `0`        | Camera lock wait limit      |
//! | `PICAM_SIM_DELAY_MS`      | `0`        | Simulated exposure time     |
//!
//! # Threading model
//!
//! One thread runs the network loop (a current-thread Tokio runtime); camera
//! I/O and base64 encoding run on a blocking pool capped at `--workers`
//! threads.

use std::net::{IpAddr, SocketAddr};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::builder::TypedValueParser;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use picam_core::protocol::DEFAULT_MAX_FRAME_LEN;
use picam_server::domain::config::{DEFAULT_CAPTURE_WORKERS, DEFAULT_PORT};
use picam_server::domain::ServerConfig;
use picam_server::infrastructure::{run_server, SimulatedCamera};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// picam camera control server.
#[derive(Debug, Parser)]
#[command(
    name = "picam-server",
    about = "Netstring JSON camera control server",
    version
)]
struct Cli {
    /// TCP port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT, env = "PICAM_PORT")]
    port: u16,

    /// IP address to bind to.  `0.0.0.0` accepts connections on every
    /// interface; `127.0.0.1` only from this machine.
    #[arg(long, default_value = "0.0.0.0", env = "PICAM_BIND")]
    bind: IpAddr,

    /// Largest accepted request frame in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN, env = "PICAM_MAX_FRAME_BYTES")]
    max_frame_bytes: usize,

    /// Maximum blocking worker threads for camera and encoding work.
    #[arg(
        long,
        default_value_t = DEFAULT_CAPTURE_WORKERS,
        env = "PICAM_WORKERS",
        value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
    )]
    workers: usize,

    /// Seconds an IMAGE request may wait for the camera; 0 waits forever.
    #[arg(long, default_value_t = 0, env = "PICAM_LOCK_TIMEOUT_SECS")]
    lock_timeout_secs: u64,

    /// Exposure time of the simulated camera in milliseconds.
    #[arg(long, default_value_t = 0, env = "PICAM_SIM_DELAY_MS")]
    sim_delay_ms: u64,
}

impl Cli {
    /// Converts the parsed arguments into a [`ServerConfig`].
    fn into_server_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::new(self.bind, self.port),
            max_frame_len: self.max_frame_bytes,
            capture_workers: self.workers,
            lock_timeout: (self.lock_timeout_secs > 0)
                .then(|| Duration::from_secs(self.lock_timeout_secs)),
            sim_delay: Duration::from_millis(self.sim_delay_ms),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. `tracing_subscriber` is initialised; `RUST_LOG` controls the level
///    (default `info`).
/// 2. CLI arguments are parsed into a [`ServerConfig`].
/// 3. A current-thread runtime is built with a blocking pool capped at
///    `--workers` threads.
/// 4. A Ctrl+C handler clears the shared `running` flag.
/// 5. [`run_server`] binds and accepts connections until the flag is cleared.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .max_blocking_threads(config.capture_workers)
        .thread_name("picam-worker")
        .build()
        .context("failed to build the Tokio runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    info!(
        bind = %config.bind_addr,
        workers = config.capture_workers,
        lock_timeout = ?config.lock_timeout,
        "picam server starting"
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let driver = Box::new(SimulatedCamera::with_exposure(config.sim_delay));
    run_server(config, driver, running).await?;

    info!("picam server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_listen_on_8090_everywhere() {
        // Arrange: no arguments, all defaults apply
        let cli = Cli::parse_from(["picam-server"]);

        // Act
        let config = cli.into_server_config();

        // Assert
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8090");
    }

    #[test]
    fn test_cli_defaults_match_server_config_defaults() {
        let config = Cli::parse_from(["picam-server"]).into_server_config();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["picam-server", "--port", "9999"]);
        assert_eq!(cli.port, 9999);
    }

    #[test]
    fn test_cli_bind_override() {
        let config = Cli::parse_from(["picam-server", "--bind", "127.0.0.1", "--port", "7000"])
            .into_server_config();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:7000");
    }

    #[test]
    fn test_cli_rejects_invalid_bind_address() {
        let result = Cli::try_parse_from(["picam-server", "--bind", "not-an-ip"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_lock_timeout_zero_means_forever() {
        let config = Cli::parse_from(["picam-server", "--lock-timeout-secs", "0"]).into_server_config();
        assert_eq!(config.lock_timeout, None);
    }

    #[test]
    fn test_cli_lock_timeout_override() {
        let config = Cli::parse_from(["picam-server", "--lock-timeout-secs", "5"]).into_server_config();
        assert_eq!(config.lock_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_cli_workers_must_be_positive() {
        assert!(Cli::try_parse_from(["picam-server", "--workers", "0"]).is_err());
        let cli = Cli::parse_from(["picam-server", "--workers", "2"]);
        assert_eq!(cli.workers, 2);
    }

    #[test]
    fn test_cli_workers_reach_server_config() {
        // Arrange
        let cli = Cli::parse_from(["picam-server", "--workers", "7"]);

        // Act
        let config = cli.into_server_config();

        // Assert
        assert_eq!(config.capture_workers, 7);
    }

    #[test]
    fn test_cli_workers_above_u16_are_rejected() {
        assert!(Cli::try_parse_from(["picam-server", "--workers", "70000"]).is_err());
    }

    #[test]
    fn test_cli_sim_delay_and_frame_limit_overrides() {
        let config = Cli::parse_from([
            "picam-server",
            "--sim-delay-ms",
            "250",
            "--max-frame-bytes",
            "1024",
        ])
        .into_server_config();
        assert_eq!(config.sim_delay, Duration::from_millis(250));
        assert_eq!(config.max_frame_len, 1024);
    }
}
