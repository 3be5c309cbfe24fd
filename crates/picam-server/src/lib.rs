//! picam-server library crate.
//!
//! This crate provides the TCP camera control service: it accepts netstring
//! framed JSON commands, dispatches them to handlers, and serialises all
//! access to the single camera.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Client (netstring JSON over TCP)
//!         ↕
//! [picam-server]
//!   ├── domain/           ServerConfig
//!   ├── application/      Dispatcher, command handlers, camera gate,
//!   │                     frame → response pipeline
//!   └── infrastructure/
//!         ├── framed/     Async netstring reader/writer
//!         ├── session/    Per-connection state machine
//!         ├── listener/   Accept loop and session factory
//!         └── sim_camera/ Simulated camera driver (image crate)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `picam-core`; the only runtime
//!   facility it uses is the blocking worker pool.
//! - `infrastructure` owns sockets, the accept loop, and concrete drivers.
//!
//! # For beginners: where does a request go?
//!
//! ```text
//! Listener ──accept──► Session ──frame──► pipeline::process_frame
//!                                           ├─ decode   (picam-core codec)
//!                                           ├─ validate (picam-core request)
//!                                           ├─ normalize
//!                                           └─ Dispatcher::dispatch
//!                                                 ├─ PING  → "PONG"
//!                                                 └─ IMAGE → CameraGate (worker thread)
//! ```

/// Domain layer: pure configuration types (no I/O).
pub mod domain;

/// Application layer: dispatch, command handlers, and the camera gate.
pub mod application;

/// Infrastructure layer: sockets, sessions, and camera drivers.
pub mod infrastructure;

/// Name announced in the greeting frame.
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

/// Version announced in the greeting frame, from the crate manifest.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
