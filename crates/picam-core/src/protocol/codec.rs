//! JSON codec for netstring payloads.
//!
//! - [`decode`] turns a frame payload into a `serde_json::Value`.
//! - [`encode`] turns a response (or the greeting) into payload bytes.
//! - [`encode_binary`] wraps captured image bytes as base64 text, because the
//!   transport carries JSON only and JSON strings cannot hold raw bytes.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::camera::ImageBytes;

/// Errors raised by the codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload is not valid UTF-8 JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// A server-built value could not be serialized.
    #[error("failed to encode JSON: {0}")]
    EncodingFailed(#[source] serde_json::Error),
}

/// Parses a frame payload as JSON.
///
/// Either the whole payload parses or nothing is returned; there are no
/// partial results.  Invalid UTF-8 is reported as [`CodecError::InvalidJson`].
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`] for anything that is not a single,
/// complete JSON document.
///
/// # Examples
///
/// ```rust
/// use picam_core::protocol::decode;
///
/// let value = decode(br#"{"command":"ping"}"#).unwrap();
/// assert_eq!(value["command"], "ping");
/// assert!(decode(b"{not json").is_err());
/// ```
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::InvalidJson)
}

/// Serializes `value` to compact JSON bytes.
///
/// # Errors
///
/// Returns [`CodecError::EncodingFailed`] if serialization fails, which only
/// happens for values that cannot be represented in JSON (e.g. maps with
/// non-string keys).
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(CodecError::EncodingFailed)
}

/// Wraps image bytes as standard (RFC 4648, padded) base64 text.
///
/// Takes the buffer by value: the raw image is dropped as soon as it has been
/// encoded, so only the base64 copy stays alive while the response is sent.
///
/// # Examples
///
/// ```rust
/// use picam_core::{protocol::encode_binary, ImageBytes};
///
/// assert_eq!(encode_binary(ImageBytes::new(b"Man".to_vec())), "TWFu");
/// ```
pub fn encode_binary(image: ImageBytes) -> String {
    let bytes = image.into_inner();
    tracing::debug!(raw_len = bytes.len(), "base64-encoding image payload");
    STANDARD.encode(bytes)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{ErrorCode, Response};
    use serde_json::json;

    #[test]
    fn test_decode_valid_request_object() {
        let value = decode(br#"{"command":"image","args":{"quality":90}}"#).unwrap();
        assert_eq!(value, json!({"command": "image", "args": {"quality": 90}}));
    }

    #[test]
    fn test_decode_accepts_non_object_json() {
        // Shape checks belong to the validator, not the codec.
        assert_eq!(decode(b"[1,2,3]").unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_decode_rejects_truncated_json() {
        let result = decode(br#"{"command":"pi"#);
        assert!(matches!(result, Err(CodecError::InvalidJson(_))));
    }

    #[test]
    fn test_decode_rejects_trailing_garbage() {
        let result = decode(br#"{"command":"ping"} extra"#);
        assert!(matches!(result, Err(CodecError::InvalidJson(_))));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let result = decode(&[b'"', 0xFF, 0xFE, b'"']);
        assert!(matches!(result, Err(CodecError::InvalidJson(_))));
    }

    #[test]
    fn test_decode_rejects_empty_payload() {
        assert!(matches!(decode(b""), Err(CodecError::InvalidJson(_))));
    }

    #[test]
    fn test_encode_response_is_compact_json() {
        let bytes = encode(&Response::failure("FOO", ErrorCode::InvalidCommand)).unwrap();
        assert_eq!(bytes, br#"{"command":"FOO","error":{"code":2}}"#.to_vec());
    }

    #[test]
    fn test_encode_binary_pads_output() {
        assert_eq!(encode_binary(ImageBytes::new(b"Ma".to_vec())), "TWE=");
        assert_eq!(encode_binary(ImageBytes::new(b"M".to_vec())), "TQ==");
        assert_eq!(encode_binary(ImageBytes::new(Vec::new())), "");
    }

    #[test]
    fn test_encode_binary_handles_non_utf8_bytes() {
        let jpeg_magic = ImageBytes::new(vec![0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(encode_binary(jpeg_magic), "/9j/4A==");
    }
}
