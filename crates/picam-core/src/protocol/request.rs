//! Request validation and normalisation.
//!
//! Every decoded payload goes through two steps, always in this order:
//!
//! 1. [`validate`] checks that the JSON value is an object carrying a string
//!    `command` field.  It is the only step that can fail.
//! 2. [`normalize`] upper-cases the command and substitutes an empty object
//!    for missing `args`.  It never fails.
//!
//! ```text
//! {"command":"ping"}  --validate-->  Request{command:"ping", args:None}
//!                     --normalize->  Request{command:"PING", args:Some({})}
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

/// A structurally valid request.
///
/// `args` is kept as an arbitrary JSON value: handlers decide for themselves
/// what shape they need (`PING` ignores it entirely).
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Command name.  Upper-case once normalised.
    pub command: String,
    /// Command arguments.  `Some` once normalised.
    pub args: Option<Value>,
}

impl Request {
    /// Creates a request; mostly useful in tests.
    pub fn new(command: impl Into<String>, args: Option<Value>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// The arguments, or an empty object when absent.
    pub fn args_or_empty(&self) -> Value {
        self.args
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Converts the request back to its wire representation.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("command".to_string(), Value::String(self.command.clone()));
        if let Some(args) = &self.args {
            object.insert("args".to_string(), args.clone());
        }
        Value::Object(object)
    }
}

/// Reasons a decoded payload is not a usable request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The payload is valid JSON but not an object.
    #[error("request is not a JSON object")]
    NotAnObject,

    /// The object has no `command` field.
    #[error("request has no command")]
    MissingCommand,

    /// `command` is present but is not a string.
    #[error("command must be a string, got {raw}")]
    InvalidCommand {
        /// The offending value, re-encoded as JSON text.
        raw: String,
    },
}

/// Checks the structure of a decoded payload.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the value is not an object, lacks a
/// `command` field, or has a non-string `command`.
///
/// # Examples
///
/// ```rust
/// use picam_core::protocol::{validate, ValidationError};
/// use serde_json::json;
///
/// let request = validate(&json!({"command": "ping"})).unwrap();
/// assert_eq!(request.command, "ping");
///
/// assert_eq!(validate(&json!({"foo": "bar"})), Err(ValidationError::MissingCommand));
/// ```
pub fn validate(decoded: &Value) -> Result<Request, ValidationError> {
    let object = decoded.as_object().ok_or(ValidationError::NotAnObject)?;
    let command = object.get("command").ok_or(ValidationError::MissingCommand)?;
    let Value::String(command) = command else {
        return Err(ValidationError::InvalidCommand {
            raw: command.to_string(),
        });
    };

    Ok(Request {
        command: command.clone(),
        args: object.get("args").cloned(),
    })
}

/// Upper-cases the command and fills in empty `args`.
///
/// Idempotent: normalising an already normalised request is a no-op.
pub fn normalize(request: Request) -> Request {
    Request {
        command: request.command.to_uppercase(),
        args: Some(
            request
                .args
                .unwrap_or_else(|| Value::Object(Map::new())),
        ),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
