//! The MXP wire format: typed frames and their binary codec.
//!
//! A frame is a fixed 64-byte header followed by up to 16 MiB of payload,
//! with a 64-bit checksum guarding the payload. [`Frame`] is the typed
//! value, [`encode`]/[`decode`] move it to and from bytes.

pub mod codec;
pub mod frame;
pub mod hash;

pub use codec::{decode, decode_header, encode, encode_header, DecodeError, FrameHeader};
pub use codec::{HEADER_LEN, MAX_PAYLOAD_SIZE};
pub use frame::{Flags, Frame, FrameKind, PROTOCOL_VERSION};
pub use hash::{checksum, random_id};
