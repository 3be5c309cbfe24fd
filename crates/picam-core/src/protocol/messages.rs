//! JSON message types exchanged over a picam connection.
//!
//! # Message flow
//!
//! ```text
//! Server → Client:  Greeting   (once, right after the connection opens)
//! Client → Server:  Request    {"command": "...", "args": {...}}
//! Server → Client:  Response   {"command": "...", "payload": ...}
//!                           or {"command": "...", "error": {"code": N}}
//! ```
//!
//! Requests are validated from a raw `serde_json::Value` (see
//! [`crate::protocol::request`]) rather than deserialized directly, because a
//! malformed `command` field must be told apart from invalid JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Error codes ───────────────────────────────────────────────────────────────

/// Process-wide error codes reported in `{"error": {"code": N}}`.
///
/// The numeric values are part of the wire protocol and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    /// The request is missing a usable `command` field.
    BadRequest = 1,
    /// The command is not registered with the dispatcher.
    InvalidCommand = 2,
    /// The request arguments are not shaped as the command expects.
    BadData = 3,
    /// An unexpected server-side or hardware failure.
    ServerError = 4,
    /// The camera rejected one of the requested settings.
    InvalidCameraArgument = 5,
}

impl ErrorCode {
    /// The integer sent on the wire.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::BadRequest),
            2 => Ok(Self::InvalidCommand),
            3 => Ok(Self::BadData),
            4 => Ok(Self::ServerError),
            5 => Ok(Self::InvalidCameraArgument),
            other => Err(other),
        }
    }
}

/// Body of the `error` field of a failure response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Numeric [`ErrorCode`].
    pub code: u8,
}

impl From<ErrorCode> for ErrorBody {
    fn from(code: ErrorCode) -> Self {
        Self {
            code: code.as_u8(),
        }
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// The reply to one request.
///
/// Exactly one of `payload` / `error` appears on the wire, which is why this is
/// an untagged enum instead of a struct with two optional fields.
///
/// ```json
/// {"command":"PING","payload":"PONG"}
/// {"command":"IMAGE","error":{"code":5}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// The handler completed and produced `payload`.
    Success { command: String, payload: Value },
    /// The request failed with `error.code`.
    Failure { command: String, error: ErrorBody },
}

impl Response {
    /// Builds a success response echoing `command`.
    pub fn success(command: impl Into<String>, payload: Value) -> Self {
        Self::Success {
            command: command.into(),
            payload,
        }
    }

    /// Builds a failure response echoing `command`.
    pub fn failure(command: impl Into<String>, code: ErrorCode) -> Self {
        Self::Failure {
            command: command.into(),
            error: code.into(),
        }
    }

    /// The echoed command name.
    pub fn command(&self) -> &str {
        match self {
            Self::Success { command, .. } | Self::Failure { command, .. } => command,
        }
    }

    /// The error code of a failure, or `None` for a success.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => ErrorCode::try_from(error.code).ok(),
        }
    }

    /// `true` for [`Response::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ── Greeting ──────────────────────────────────────────────────────────────────

/// Server identity sent once to every client immediately after accept.
///
/// ```json
/// {"name":"picam-server","version":[0,1,0]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    /// Server name.
    pub name: String,
    /// Semantic version as `[major, minor, patch]`.
    pub version: [u32; 3],
}

impl Greeting {
    /// Creates a greeting for the given server identity.
    pub fn new(name: impl Into<String>, version: [u32; 3]) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parses a `major.minor.patch` version string, as found in
    /// `CARGO_PKG_VERSION`.  Missing or non-numeric parts become `0`.
    pub fn from_version_str(name: impl Into<String>, version: &str) -> Self {
        let mut parts = [0u32; 3];
        // Pre-release / build suffixes ("1.2.3-rc1") are ignored.
        let core = version.split(['-', '+']).next().unwrap_or_default();
        for (slot, part) in parts.iter_mut().zip(core.split('.')) {
            *slot = part.parse().unwrap_or(0);
        }
        Self::new(name, parts)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_code_wire_values_are_fixed() {
        assert_eq!(ErrorCode::BadRequest.as_u8(), 1);
        assert_eq!(ErrorCode::InvalidCommand.as_u8(), 2);
        assert_eq!(ErrorCode::BadData.as_u8(), 3);
        assert_eq!(ErrorCode::ServerError.as_u8(), 4);
        assert_eq!(ErrorCode::InvalidCameraArgument.as_u8(), 5);
    }

    #[test]
    fn test_error_code_try_from_rejects_unknown() {
        assert_eq!(ErrorCode::try_from(5), Ok(ErrorCode::InvalidCameraArgument));
        assert_eq!(ErrorCode::try_from(0), Err(0));
        assert_eq!(ErrorCode::try_from(6), Err(6));
    }

    #[test]
    fn test_success_serializes_without_error_field() {
        // Arrange
        let response = Response::success("PING", json!("PONG"));

        // Act
        let value = serde_json::to_value(&response).unwrap();

        // Assert
        assert_eq!(value, json!({"command": "PING", "payload": "PONG"}));
    }

    #[test]
    fn test_failure_serializes_without_payload_field() {
        let response = Response::failure("IMAGE", ErrorCode::InvalidCameraArgument);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({"command": "IMAGE", "error": {"code": 5}}));
    }

    #[test]
    fn test_failure_deserializes_to_failure_variant() {
        let response: Response =
            serde_json::from_value(json!({"command": "X", "error": {"code": 2}})).unwrap();
        assert_eq!(response.error_code(), Some(ErrorCode::InvalidCommand));
        assert_eq!(response.command(), "X");
    }

    #[test]
    fn test_success_with_null_payload_deserializes_as_success() {
        let response: Response =
            serde_json::from_value(json!({"command": "X", "payload": null})).unwrap();
        assert!(response.is_success());
    }

    #[test]
    fn test_greeting_serializes_version_as_array() {
        let greeting = Greeting::new("picam-server", [1, 2, 3]);
        let value = serde_json::to_value(&greeting).unwrap();
        assert_eq!(value, json!({"name": "picam-server", "version": [1, 2, 3]}));
    }

    #[test]
    fn test_greeting_from_version_str() {
        assert_eq!(
            Greeting::from_version_str("s", "0.4.12").version,
            [0, 4, 12]
        );
        assert_eq!(
            Greeting::from_version_str("s", "2.0.0-rc.1").version,
            [2, 0, 0]
        );
        assert_eq!(Greeting::from_version_str("s", "7").version, [7, 0, 0]);
    }
}
