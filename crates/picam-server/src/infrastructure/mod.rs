//! Infrastructure layer for picam-server.
//!
//! Everything that touches the outside world lives here:
//!
//! - Binding the TCP listener and accepting connections ([`listener`])
//! - Reading and writing netstring frames on a socket ([`framed`])
//! - Running the per-connection state machine ([`session`])
//! - The simulated camera driver ([`sim_camera`])
//!
//! # What does NOT belong here?
//!
//! - Request validation and dispatch (application layer)
//! - Configuration parsing (done in `main.rs`)

pub mod framed;
pub mod listener;
pub mod session;
pub mod sim_camera;

pub use listener::{bind_server, run_server, Listener, SessionFactory};
pub use session::{Session, SessionError, SessionState};
pub use sim_camera::SimulatedCamera;
