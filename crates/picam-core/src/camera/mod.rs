//! Camera capability as seen by the server.
//!
//! The server never talks to camera hardware directly.  It goes through two
//! small traits that a driver implements:
//!
//! ```text
//! CameraDriver::open()          -> Box<dyn CameraHandle>
//! CameraHandle::configure(..)   -> Ok | InvalidArgument
//! CameraHandle::capture(..)     -> ImageBytes | InvalidArgument | HardwareFailure
//! CameraHandle::close()
//! ```
//!
//! All methods are **blocking**: real camera drivers sleep while the sensor
//! settles and the frame is read out.  The server therefore only calls them
//! from a worker thread, never from the network loop.
//!
//! # Testability
//!
//! Because the traits are object safe, tests can substitute recording or
//! `mockall`-generated doubles for the real driver.

pub mod options;

use thiserror::Error;

pub use options::{
    CameraOptions, CameraSettings, CaptureSpec, ImageFormat, JpegOptions, OptionsError, Thumbnail,
    DEFAULT_JPEG_QUALITY,
};

/// Errors reported by a camera driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// The hardware rejected a setting or capture parameter value.
    #[error("invalid camera argument: {0}")]
    InvalidArgument(String),

    /// The hardware failed while performing a valid operation.
    #[error("camera hardware failure: {0}")]
    HardwareFailure(String),

    /// The camera could not be opened (missing, busy, or not enabled).
    #[error("camera unavailable: {0}")]
    Unavailable(String),
}

/// Factory for camera handles.
///
/// A driver represents the single physical camera.  The server keeps it behind
/// the camera lock, so `open` is never called while another handle is alive.
pub trait CameraDriver: Send {
    /// Opens the camera and returns a handle for one configure/capture cycle.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::Unavailable`] if the hardware cannot be opened.
    fn open(&mut self) -> Result<Box<dyn CameraHandle>, CameraError>;
}

/// An open camera.
pub trait CameraHandle: Send {
    /// Applies every setting present in `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::InvalidArgument`] for an out-of-range value.
    fn configure(&mut self, settings: &CameraSettings) -> Result<(), CameraError>;

    /// Captures one still image into memory.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::InvalidArgument`] for a bad capture parameter,
    /// or [`CameraError::HardwareFailure`] if the capture itself fails.
    fn capture(&mut self, spec: &CaptureSpec) -> Result<ImageBytes, CameraError>;

    /// Releases the hardware.  Called exactly once per successful `open`.
    fn close(&mut self);
}

/// An encoded image produced by a capture.
///
/// Ownership moves from the camera to the command handler to the codec,
/// which consumes it in [`crate::protocol::encode_binary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBytes(Vec<u8>);

impl ImageBytes {
    /// Wraps an encoded image buffer.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Size of the encoded image in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the raw bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Unwraps the raw bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for ImageBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
