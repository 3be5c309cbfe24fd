//! Camera Access Gate: exclusive, off-loop access to the single camera.
//!
//! There is exactly one physical camera, and its driver blocks while the
//! sensor settles and the frame is read out.  The gate solves both problems:
//!
//! 1. **Exclusion** – the driver lives inside a `tokio::sync::Mutex`.  Only the
//!    holder of the lock can touch it, and waiters are served in FIFO order.
//! 2. **Off-loop execution** – once the lock is held, the whole
//!    open → configure → capture → close sequence runs on tokio's blocking
//!    worker pool.  The network loop only awaits the result.
//!
//! ```text
//! IMAGE (session A) ──lock──► [worker] open → configure → capture → close ──unlock──►
//! IMAGE (session B) ──lock (waits) ···································──► [worker] ...
//! PING  (session C) ──► answered immediately, never touches the gate
//! ```
//!
//! # Release guarantee
//!
//! The owned lock guard is *moved into* the worker closure.  It is dropped when
//! the closure returns, errors, or unwinds from a panic, so the lock is
//! released on every path.  The worker also keeps running if the requesting
//! session disappears mid-capture; the result is simply discarded.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use picam_core::camera::{CameraOptions, CaptureSpec, CameraSettings};
use picam_core::{CameraDriver, CameraError, CameraHandle, ImageBytes};

/// Failures of one gated capture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// The camera rejected a setting or capture parameter.
    #[error("camera rejected an argument: {0}")]
    InvalidCameraArgument(String),

    /// Opening the camera or performing the capture failed.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    /// The camera lock was not acquired within the configured timeout.
    #[error("timed out after {0:?} waiting for the camera")]
    LockTimeout(Duration),

    /// The driver panicked on the worker thread.
    #[error("camera worker panicked")]
    WorkerPanicked,
}

// ── Statistics ────────────────────────────────────────────────────────────────

/// Lock usage counters, shared between the gate and its in-flight captures.
#[derive(Debug, Default)]
struct GateCounters {
    acquisitions: AtomicU64,
    releases: AtomicU64,
    holders: AtomicUsize,
    peak_holders: AtomicUsize,
}

/// Point-in-time copy of the gate's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    /// Times the camera lock has been acquired.
    pub acquisitions: u64,
    /// Times the camera lock has been released.
    pub releases: u64,
    /// Most captures ever observed holding the lock at the same instant.
    pub peak_holders: usize,
}

/// The camera lock guard, counted on acquisition and on drop.
struct HeldCamera {
    guard: OwnedMutexGuard<Box<dyn CameraDriver>>,
    counters: Arc<GateCounters>,
}

impl HeldCamera {
    fn new(guard: OwnedMutexGuard<Box<dyn CameraDriver>>, counters: Arc<GateCounters>) -> Self {
        counters.acquisitions.fetch_add(1, Ordering::SeqCst);
        let holders = counters.holders.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_holders.fetch_max(holders, Ordering::SeqCst);
        Self { guard, counters }
    }

    fn driver(&mut self) -> &mut dyn CameraDriver {
        &mut **self.guard
    }
}

impl Drop for HeldCamera {
    fn drop(&mut self) {
        self.counters.holders.fetch_sub(1, Ordering::SeqCst);
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// An open camera handle that is closed when dropped.
struct OpenCamera(Box<dyn CameraHandle>);

impl Drop for OpenCamera {
    fn drop(&mut self) {
        self.0.close();
    }
}

// ── Gate ──────────────────────────────────────────────────────────────────────

/// Owns the camera driver and serialises every capture through it.
///
/// Share one gate per process with `Arc<CameraGate>`.
pub struct CameraGate {
    driver: Arc<Mutex<Box<dyn CameraDriver>>>,
    lock_timeout: Option<Duration>,
    counters: Arc<GateCounters>,
}

impl CameraGate {
    /// Creates a gate around `driver`.
    ///
    /// `lock_timeout` bounds how long a capture waits for the lock; `None`
    /// waits forever.
    pub fn new(driver: Box<dyn CameraDriver>, lock_timeout: Option<Duration>) -> Self {
        Self {
            driver: Arc::new(Mutex::new(driver)),
            lock_timeout,
            counters: Arc::new(GateCounters::default()),
        }
    }

    /// Acquires the camera, applies the settings, and captures one image.
    ///
    /// # Errors
    ///
    /// - [`GateError::InvalidCameraArgument`] if the camera rejects a value;
    ///   configure rejections abort before any capture.
    /// - [`GateError::CaptureFailed`] if the camera cannot be opened or the
    ///   capture fails in hardware.
    /// - [`GateError::LockTimeout`] if the configured lock timeout elapses.
    /// - [`GateError::WorkerPanicked`] if the driver panics.
    pub async fn capture_image(&self, options: CameraOptions) -> Result<ImageBytes, GateError> {
        let guard = self.acquire().await?;
        let mut held = HeldCamera::new(guard, Arc::clone(&self.counters));
        debug!("camera lock acquired");

        let worker = tokio::task::spawn_blocking(move || {
            let result = run_capture(held.driver(), &options);
            drop(held);
            result
        });

        match worker.await {
            Ok(result) => {
                debug!(ok = result.is_ok(), "camera lock released");
                result
            }
            Err(join_err) if join_err.is_panic() => {
                error!("camera driver panicked; lock released");
                Err(GateError::WorkerPanicked)
            }
            Err(join_err) => Err(GateError::CaptureFailed(join_err.to_string())),
        }
    }

    /// Snapshot of the lock counters.
    pub fn stats(&self) -> GateStats {
        GateStats {
            acquisitions: self.counters.acquisitions.load(Ordering::SeqCst),
            releases: self.counters.releases.load(Ordering::SeqCst),
            peak_holders: self.counters.peak_holders.load(Ordering::SeqCst),
        }
    }

    async fn acquire(&self) -> Result<OwnedMutexGuard<Box<dyn CameraDriver>>, GateError> {
        let lock = Arc::clone(&self.driver).lock_owned();
        match self.lock_timeout {
            None => Ok(lock.await),
            Some(limit) => timeout(limit, lock).await.map_err(|_| {
                warn!(?limit, "gave up waiting for the camera lock");
                GateError::LockTimeout(limit)
            }),
        }
    }
}

impl fmt::Debug for CameraGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraGate")
            .field("lock_timeout", &self.lock_timeout)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

// ── Worker side ───────────────────────────────────────────────────────────────

/// The blocking open → configure → capture → close sequence.
fn run_capture(driver: &mut dyn CameraDriver, options: &CameraOptions) -> Result<ImageBytes, GateError> {
    let handle = driver
        .open()
        .map_err(|e| GateError::CaptureFailed(format!("open: {e}")))?;
    let mut camera = OpenCamera(handle);

    configure(camera.0.as_mut(), &options.settings)?;
    capture(camera.0.as_mut(), &options.capture)
}

fn configure(handle: &mut dyn CameraHandle, settings: &CameraSettings) -> Result<(), GateError> {
    handle
        .configure(settings)
        .map_err(|e| classify("configure", e))
}

fn capture(handle: &mut dyn CameraHandle, spec: &CaptureSpec) -> Result<ImageBytes, GateError> {
    let image = handle.capture(spec).map_err(|e| classify("capture", e))?;
    debug!(format = %spec.format, bytes = image.len(), "frame captured");
    Ok(image)
}

/// A rejected value is the client's fault; anything else is the hardware's.
fn classify(stage: &str, err: CameraError) -> GateError {
    match err {
        CameraError::InvalidArgument(msg) => {
            debug!(stage, %msg, "camera rejected argument");
            GateError::InvalidCameraArgument(msg)
        }
        other => {
            warn!(stage, error = %other, "camera operation failed");
            GateError::CaptureFailed(format!("{stage}: {other}"))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
