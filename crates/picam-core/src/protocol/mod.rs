//! Protocol module containing the netstring framing, JSON codec, request
//! validation, and response message types.

pub mod codec;
pub mod messages;
pub mod netstring;
pub mod request;

pub use codec::{decode, encode, encode_binary, CodecError};
pub use messages::{ErrorBody, ErrorCode, Greeting, Response};
pub use netstring::{encode_netstring, FrameError, NetstringDecoder, DEFAULT_MAX_FRAME_LEN};
pub use request::{normalize, validate, Request, ValidationError};
