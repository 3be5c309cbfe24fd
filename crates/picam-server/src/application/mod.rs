//! Application layer for picam-server.
//!
//! Turns one decoded frame into one (optional) response.  Nothing here owns a
//! socket; the session in the infrastructure layer feeds frames in and writes
//! responses out.
//!
//! - [`pipeline`] – decode → validate → normalize → dispatch for one frame.
//! - [`dispatcher`] – command registry and outcome → `Response` folding.
//! - [`commands`] – the built-in `PING` and `IMAGE` handlers.
//! - [`camera_gate`] – exclusive, off-loop access to the camera.

pub mod camera_gate;
pub mod commands;
pub mod dispatcher;
pub mod pipeline;

pub use camera_gate::{CameraGate, GateError, GateStats};
pub use commands::{default_dispatcher, ImageHandler, PingHandler};
pub use dispatcher::{CommandError, CommandHandler, Dispatcher};
pub use pipeline::process_frame;
