//! # picam-core
//!
//! Shared library for picam containing the netstring framing, the JSON codec,
//! request validation, response types, and the camera capability traits.
//!
//! It has no dependencies on sockets, async runtimes, or camera hardware, so
//! everything here can be unit tested in isolation.
//!
//! # Architecture overview (for beginners)
//!
//! picam is a tiny network service that lets a client take pictures with a
//! camera attached to the server.  The client opens a TCP connection and sends
//! JSON commands such as `{"command":"ping"}` or `{"command":"image"}`; the
//! server answers each command with one JSON response.
//!
//! This crate (`picam-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel over the network.  Every JSON document
//!   is wrapped in a *netstring* (`<length>:<payload>,`) so the receiver knows
//!   where one message ends and the next begins.  The codec turns payloads
//!   into JSON values, the validator turns JSON values into typed requests,
//!   and the response types describe what goes back to the client.
//!
//! - **`camera`** – The camera capability as seen by the server: the typed
//!   options a client may pass to `IMAGE`, and the `CameraDriver` /
//!   `CameraHandle` traits that a hardware (or simulated) driver implements.

pub mod camera;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `picam_core::Response` instead of `picam_core::protocol::messages::Response`.
pub use camera::{CameraDriver, CameraError, CameraHandle, CameraOptions, ImageBytes};
pub use protocol::codec::CodecError;
pub use protocol::messages::{ErrorCode, Greeting, Response};
pub use protocol::netstring::{FrameError, NetstringDecoder};
pub use protocol::request::{Request, ValidationError};
