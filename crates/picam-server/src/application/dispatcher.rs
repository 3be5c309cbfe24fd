//! Command Dispatcher: maps normalised command names to handlers.
//!
//! The registry is an explicit `HashMap` filled once at startup; there is no
//! reflection or name mangling.  Lookup is an exact match on the upper-cased
//! command, so registration upper-cases names as well.
//!
//! Every handler outcome is folded into a [`Response`]:
//!
//! | Outcome                    | Response                                   |
//! |----------------------------|--------------------------------------------|
//! | unknown command            | `Failure{command, INVALID_COMMAND}`        |
//! | `Ok(value)`                | `Success{command, payload: value}`         |
//! | `Err(CommandError)`        | `Failure{command, error.code()}`           |
//! | handler panicked           | `Failure{command, SERVER_ERROR}`           |

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use picam_core::{ErrorCode, Request, Response};

/// Domain failures a command handler can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The request itself is unusable.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No handler is registered under this name.
    #[error("unknown command {0:?}")]
    MethodNotFound(String),

    /// The arguments are not shaped as the command expects.
    #[error("bad data: {0}")]
    BadData(String),

    /// The camera rejected one of the requested values.
    #[error("invalid camera argument: {0}")]
    InvalidCameraArgument(String),

    /// An unexpected internal or hardware failure.
    #[error("server error: {0}")]
    ServerError(String),
}

impl CommandError {
    /// The wire error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::MethodNotFound(_) => ErrorCode::InvalidCommand,
            Self::BadData(_) => ErrorCode::BadData,
            Self::InvalidCameraArgument(_) => ErrorCode::InvalidCameraArgument,
            Self::ServerError(_) => ErrorCode::ServerError,
        }
    }
}

/// A registered command.
///
/// Handlers receive the normalised `args` (an empty object when the client
/// sent none) and return the response payload.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Runs the command.
    async fn handle(&self, args: Value) -> Result<Value, CommandError>;
}

/// Registry of command handlers.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name` (case-insensitive).  A later
    /// registration under the same name replaces the earlier one.
    pub fn register(&mut self, name: &str, handler: Arc<dyn CommandHandler>) -> &mut Self {
        let name = name.to_uppercase();
        if self.handlers.insert(name.clone(), handler).is_some() {
            warn!(command = %name, "replacing existing command handler");
        }
        self
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs the handler for a normalised request and builds its response.
    ///
    /// Never fails: unknown commands, handler errors, and handler panics all
    /// become [`Response::Failure`].
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request { command, args } = request;

        let Some(handler) = self.handlers.get(&command) else {
            let err = CommandError::MethodNotFound(command.clone());
            warn!(%command, "{err}");
            return Response::failure(command, err.code());
        };

        let args = args.unwrap_or_else(|| Value::Object(Map::new()));
        let outcome = AssertUnwindSafe(handler.handle(args)).catch_unwind().await;

        match outcome {
            Ok(Ok(payload)) => {
                debug!(%command, "command succeeded");
                Response::success(command, payload)
            }
            Ok(Err(err)) => {
                warn!(%command, code = err.code().as_u8(), "command failed: {err}");
                Response::failure(command, err.code())
            }
            Err(panic) => {
                error!(%command, reason = panic_message(&*panic), "command handler panicked");
                Response::failure(command, ErrorCode::ServerError)
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.commands())
            .finish()
    }
}

/// Best-effort text of a panic payload.
fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
