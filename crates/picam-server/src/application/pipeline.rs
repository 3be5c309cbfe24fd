//! Per-frame request pipeline.
//!
//! The stages always run in this order:
//!
//! ```text
//! payload ─decode─► Value ─validate─► Request ─normalize─► Request ─dispatch─► Response
//!            │                 │
//!            └─ dropped        ├─ no command / not an object: dropped
//!                              └─ non-string command: BAD_REQUEST
//! ```
//!
//! "Dropped" means the failure is logged and no response is sent; the session
//! keeps reading.  There is nothing sensible to echo in the `command` field of
//! a reply to a payload that is not JSON or carries no command.
//!
//! A non-string `command` is echoed back as its JSON text inside a string, so
//! `{"command":42}` is answered with `{"command":"42","error":{"code":1}}`.
//! The `command` field of every response is therefore always a string.

use tracing::{debug, warn};

use picam_core::protocol::{decode, normalize, validate};
use picam_core::{ErrorCode, Response, ValidationError};

use crate::application::dispatcher::Dispatcher;

/// Runs one frame payload through the pipeline.
///
/// Returns `None` when the frame is dropped without a reply.
pub async fn process_frame(dispatcher: &Dispatcher, payload: &[u8]) -> Option<Response> {
    let decoded = match decode(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!(len = payload.len(), "dropping frame: {e}");
            return None;
        }
    };

    let request = match validate(&decoded) {
        Ok(request) => request,
        Err(ValidationError::InvalidCommand { raw }) => {
            warn!(command = %raw, "rejecting request with non-string command");
            return Some(Response::failure(raw, ErrorCode::BadRequest));
        }
        Err(e) => {
            warn!("dropping request: {e}");
            return None;
        }
    };

    let request = normalize(request);
    debug!(command = %request.command, "dispatching request");
    Some(dispatcher.dispatch(request).await)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
