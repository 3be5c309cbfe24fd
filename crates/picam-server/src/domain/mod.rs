//! Domain layer for picam-server.
//!
//! Pure types with no dependencies on I/O, sockets, or the async runtime.
//! Currently this is the server configuration; the wire message types live in
//! `picam-core` because clients need them too.

pub mod config;

pub use config::ServerConfig;
