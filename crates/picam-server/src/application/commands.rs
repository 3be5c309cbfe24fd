//! Built-in commands: `PING` and `IMAGE`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use picam_core::camera::OptionsError;
use picam_core::protocol::encode_binary;
use picam_core::CameraOptions;

use crate::application::camera_gate::{CameraGate, GateError};
use crate::application::dispatcher::{CommandError, CommandHandler, Dispatcher};

/// Name under which [`PingHandler`] is registered.
pub const PING: &str = "PING";

/// Name under which [`ImageHandler`] is registered.
pub const IMAGE: &str = "IMAGE";

/// Payload returned by `PING`.
pub const PONG: &str = "PONG";

impl From<GateError> for CommandError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::InvalidCameraArgument(msg) => Self::InvalidCameraArgument(msg),
            other => Self::ServerError(other.to_string()),
        }
    }
}

impl From<OptionsError> for CommandError {
    fn from(err: OptionsError) -> Self {
        match err {
            OptionsError::NotAnObject => Self::BadData(err.to_string()),
            other => Self::InvalidCameraArgument(other.to_string()),
        }
    }
}

/// Liveness check.  Ignores its arguments entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingHandler;

#[async_trait]
impl CommandHandler for PingHandler {
    async fn handle(&self, _args: Value) -> Result<Value, CommandError> {
        Ok(Value::String(PONG.to_string()))
    }
}

/// Captures a still image and returns it as base64 text.
#[derive(Debug, Clone)]
pub struct ImageHandler {
    gate: Arc<CameraGate>,
}

impl ImageHandler {
    pub fn new(gate: Arc<CameraGate>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl CommandHandler for ImageHandler {
    async fn handle(&self, args: Value) -> Result<Value, CommandError> {
        let options = CameraOptions::from_args(&args)?;
        debug!(
            format = %options.capture.format,
            resolution = ?options.settings.resolution,
            "capture requested"
        );

        let image = self.gate.capture_image(options).await?;

        // Base64 of a multi-megabyte frame is too slow for the network loop.
        let encoded = tokio::task::spawn_blocking(move || encode_binary(image))
            .await
            .map_err(|e| CommandError::ServerError(format!("encoding worker failed: {e}")))?;

        Ok(Value::String(encoded))
    }
}

/// Builds the dispatcher with every built-in command registered.
pub fn default_dispatcher(gate: Arc<CameraGate>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .register(PING, Arc::new(PingHandler))
        .register(IMAGE, Arc::new(ImageHandler::new(gate)));
    dispatcher
}

// ── Tests ─────────────────────────────────────────────────────────────────────
