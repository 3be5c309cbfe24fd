//! Netstring framing for the picam TCP protocol.
//!
//! Wire format:
//! ```text
//! <length>:<payload>,
//! ```
//! `<length>` is the payload size in bytes written as ASCII decimal digits,
//! followed by a colon, the raw payload, and a single trailing comma.  For
//! example the payload `{"command":"ping"}` travels as
//! `18:{"command":"ping"},`.
//!
//! # Why a buffer is needed
//!
//! TCP is a stream protocol.  A single `read()` may return half a frame, or
//! two and a half frames.  [`NetstringDecoder`] accumulates bytes across reads
//! and hands out complete frames one at a time, in the order they arrived.
//!
//! # Memory bound
//!
//! The declared length is checked against the configured maximum as soon as
//! the length prefix has been read, before any of the payload is buffered, so
//! a hostile peer cannot make the server allocate an arbitrarily large buffer.

use thiserror::Error;

/// Default upper bound for a single frame payload (32 MiB).
///
/// Large enough for a full-resolution PNG wrapped in base64, small enough to
/// keep a misbehaving client from exhausting memory.
pub const DEFAULT_MAX_FRAME_LEN: usize = 32 * 1024 * 1024;

/// Longest length prefix accepted, in digits.  `u64::MAX` has 20 digits.
const MAX_LENGTH_DIGITS: usize = 20;

/// Errors produced while decoding netstring frames.
///
/// Every variant is fatal for the connection: once the framing is out of sync
/// there is no reliable way to find the start of the next frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The length prefix is empty or contains something other than digits.
    #[error("malformed netstring length prefix: {0:?}")]
    MalformedLength(String),

    /// The declared payload length exceeds the configured maximum.
    #[error("frame of {declared} bytes exceeds the {max} byte limit")]
    TooLarge { declared: u64, max: usize },

    /// The byte after the payload is not the `,` terminator.
    #[error("netstring missing ',' terminator (found 0x{found:02X})")]
    MissingTerminator { found: u8 },
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Wraps `payload` in a netstring frame.
///
/// # Examples
///
/// ```rust
/// use picam_core::protocol::encode_netstring;
///
/// assert_eq!(encode_netstring(b"hello"), b"5:hello,".to_vec());
/// assert_eq!(encode_netstring(b""), b"0:,".to_vec());
/// ```
pub fn encode_netstring(payload: &[u8]) -> Vec<u8> {
    let prefix = format!("{}:", payload.len());
    let mut frame = Vec::with_capacity(prefix.len() + payload.len() + 1);
    frame.extend_from_slice(prefix.as_bytes());
    frame.extend_from_slice(payload);
    frame.push(b',');
    frame
}

// ── Incremental decoding ──────────────────────────────────────────────────────

/// Incremental netstring decoder.
///
/// Feed it raw bytes with [`extend`](Self::extend) as they arrive from the
/// socket, then call [`next_frame`](Self::next_frame) until it returns
/// `Ok(None)`.
///
/// # Examples
///
/// ```rust
/// use picam_core::protocol::NetstringDecoder;
///
/// let mut decoder = NetstringDecoder::default();
/// decoder.extend(b"4:pi");
/// assert_eq!(decoder.next_frame().unwrap(), None); // half a frame so far
///
/// decoder.extend(b"ng,2:ok,");
/// assert_eq!(decoder.next_frame().unwrap(), Some(b"ping".to_vec()));
/// assert_eq!(decoder.next_frame().unwrap(), Some(b"ok".to_vec()));
/// assert_eq!(decoder.next_frame().unwrap(), None);
/// ```
#[derive(Debug)]
pub struct NetstringDecoder {
    /// Bytes received but not yet returned as part of a complete frame.
    buf: Vec<u8>,
    max_frame_len: usize,
}

impl NetstringDecoder {
    /// Creates a decoder that rejects frames larger than `max_frame_len` bytes.
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(4096),
            max_frame_len,
        }
    }

    /// Appends freshly received bytes to the internal buffer.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes buffered that do not yet form a complete frame.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Drops any buffered partial frame and releases its memory.
    pub fn clear(&mut self) {
        self.buf = Vec::new();
    }

    /// Extracts the next complete frame from the buffer.
    ///
    /// Returns `Ok(Some(payload))` when a whole frame is available and
    /// `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] when the buffered bytes cannot be the start of
    /// a valid netstring.  Oversized frames are rejected as soon as their
    /// length prefix is complete.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let colon = self.buf.iter().position(|&b| b == b':');
        let digits = match colon {
            Some(idx) => &self.buf[..idx],
            None => &self.buf[..],
        };

        // Only "0" itself may start with a zero.
        let leading_zero = digits.len() > 1 && digits[0] == b'0';
        if digits.iter().any(|b| !b.is_ascii_digit())
            || digits.len() > MAX_LENGTH_DIGITS
            || leading_zero
        {
            return Err(FrameError::MalformedLength(
                String::from_utf8_lossy(digits).into_owned(),
            ));
        }

        let declared = parse_length(digits);
        if declared > self.max_frame_len as u64 {
            return Err(FrameError::TooLarge {
                declared,
                max: self.max_frame_len,
            });
        }

        let Some(colon) = colon else {
            // Length prefix still arriving.
            return Ok(None);
        };
        if colon == 0 {
            return Err(FrameError::MalformedLength(String::new()));
        }

        // `declared <= max_frame_len` so the cast cannot truncate.
        let start = colon + 1;
        let end = start + declared as usize;
        if self.buf.len() <= end {
            return Ok(None);
        }

        let terminator = self.buf[end];
        if terminator != b',' {
            return Err(FrameError::MissingTerminator { found: terminator });
        }

        let payload = self.buf[start..end].to_vec();
        // `drain(..=end)` shifts the remaining bytes to the front; fine for the
        // handful of frames a session has buffered at any one time.
        self.buf.drain(..=end);
        Ok(Some(payload))
    }
}

impl Default for NetstringDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

/// Parses ASCII digits, saturating at `u64::MAX` instead of overflowing.
fn parse_length(digits: &[u8]) -> u64 {
    digits.iter().fold(0u64, |acc, d| {
        acc.saturating_mul(10).saturating_add(u64::from(d - b'0'))
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_netstring_wraps_payload() {
        assert_eq!(encode_netstring(b"{\"a\":1}"), b"7:{\"a\":1},".to_vec());
    }

    #[test]
    fn test_decode_complete_frame() {
        // Arrange
        let mut decoder = NetstringDecoder::default();
        decoder.extend(b"5:hello,");

        // Act
        let frame = decoder.next_frame().unwrap();

        // Assert
        assert_eq!(frame, Some(b"hello".to_vec()));
        assert_eq!(decoder.buffered_len(), 0, "consumed bytes must be drained");
    }

    #[test]
    fn test_decode_empty_payload() {
        let mut decoder = NetstringDecoder::default();
        decoder.extend(b"0:,");
        assert_eq!(decoder.next_frame().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_frame_is_not_delivered_before_terminator_arrives() {
        // Arrange: the whole payload but no trailing comma yet
        let mut decoder = NetstringDecoder::default();
        decoder.extend(b"5:hello");

        // Act / Assert
        assert_eq!(decoder.next_frame().unwrap(), None);
        decoder.extend(b",");
        assert_eq!(decoder.next_frame().unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_frame_split_byte_by_byte_is_reassembled() {
        let mut decoder = NetstringDecoder::default();
        let wire = encode_netstring(b"{\"command\":\"ping\"}");

        let mut frames = Vec::new();
        for byte in &wire {
            decoder.extend(std::slice::from_ref(byte));
            if let Some(frame) = decoder.next_frame().unwrap() {
                frames.push(frame);
            }
        }

        assert_eq!(frames, vec![b"{\"command\":\"ping\"}".to_vec()]);
    }

    #[test]
    fn test_two_frames_in_one_read_are_yielded_in_order() {
        // Arrange: simulates TCP coalescing two sends into one recv
        let mut decoder = NetstringDecoder::default();
        decoder.extend(b"3:one,3:two,1:t");

        // Act / Assert
        assert_eq!(decoder.next_frame().unwrap(), Some(b"one".to_vec()));
        assert_eq!(decoder.next_frame().unwrap(), Some(b"two".to_vec()));
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert_eq!(decoder.buffered_len(), 3, "partial third frame stays buffered");
    }

    #[test]
    fn test_payload_may_contain_colons_and_commas() {
        let mut decoder = NetstringDecoder::default();
        decoder.extend(b"7:a:b,c,d,");
        assert_eq!(decoder.next_frame().unwrap(), Some(b"a:b,c,d".to_vec()));
    }

    #[test]
    fn test_oversized_frame_is_rejected_from_prefix_alone() {
        // Arrange: limit of 10 bytes, prefix declares 11, no payload sent yet
        let mut decoder = NetstringDecoder::new(10);
        decoder.extend(b"11:");

        // Act
        let result = decoder.next_frame();

        // Assert
        assert_eq!(result, Err(FrameError::TooLarge { declared: 11, max: 10 }));
    }

    #[test]
    fn test_oversized_prefix_is_rejected_before_colon() {
        let mut decoder = NetstringDecoder::new(10);
        decoder.extend(b"999");
        assert!(matches!(decoder.next_frame(), Err(FrameError::TooLarge { .. })));
    }

    #[test]
    fn test_frame_at_exact_limit_is_accepted() {
        let mut decoder = NetstringDecoder::new(4);
        decoder.extend(b"4:abcd,");
        assert_eq!(decoder.next_frame().unwrap(), Some(b"abcd".to_vec()));
    }

    #[test]
    fn test_non_digit_prefix_is_malformed() {
        let mut decoder = NetstringDecoder::default();
        decoder.extend(b"{\"command\":\"ping\"}");
        assert!(matches!(decoder.next_frame(), Err(FrameError::MalformedLength(_))));
    }

    #[test]
    fn test_leading_zero_prefix_is_malformed() {
        // Arrange
        let mut decoder = NetstringDecoder::default();
        decoder.extend(b"0042:");

        // Act
        let result = decoder.next_frame();

        // Assert
        assert_eq!(result, Err(FrameError::MalformedLength("0042".to_string())));
    }

    #[test]
    fn test_leading_zero_is_rejected_while_prefix_is_still_arriving() {
        let mut decoder = NetstringDecoder::default();
        decoder.extend(b"0");
        assert_eq!(decoder.next_frame(), Ok(None));
        decoder.extend(b"5");
        assert!(matches!(decoder.next_frame(), Err(FrameError::MalformedLength(_))));
    }

    #[test]
    fn test_empty_prefix_is_malformed() {
        let mut decoder = NetstringDecoder::default();
        decoder.extend(b":abc,");
        assert_eq!(
            decoder.next_frame(),
            Err(FrameError::MalformedLength(String::new()))
        );
    }

    #[test]
    fn test_absurdly_long_prefix_is_malformed() {
        let mut decoder = NetstringDecoder::new(usize::MAX);
        decoder.extend(&[b'0'; 21]);
        assert!(matches!(decoder.next_frame(), Err(FrameError::MalformedLength(_))));
    }

    #[test]
    fn test_missing_terminator_is_rejected() {
        let mut decoder = NetstringDecoder::default();
        decoder.extend(b"3:abcX");
        assert_eq!(
            decoder.next_frame(),
            Err(FrameError::MissingTerminator { found: b'X' })
        );
    }

    #[test]
    fn test_clear_releases_partial_frame() {
        let mut decoder = NetstringDecoder::default();
        decoder.extend(b"10:abc");
        decoder.clear();
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_parse_length_saturates() {
        assert_eq!(parse_length(b"99999999999999999999"), u64::MAX);
        assert_eq!(parse_length(b"0042"), 42);
    }
}
