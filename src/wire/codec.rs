//! Binary encoding and decoding of frames.
//!
//! Layout of the 64-byte header, all integers little-endian:
//!
//! | offset | size | field            |
//! |--------|------|------------------|
//! | 0      | 1    | version          |
//! | 1      | 1    | kind             |
//! | 2      | 1    | flags            |
//! | 3      | 1    | priority         |
//! | 4      | 4    | reserved         |
//! | 8      | 8    | message id       |
//! | 16     | 8    | trace id         |
//! | 24     | 8    | correlation id   |
//! | 32     | 4    | payload length   |
//! | 36     | 20   | reserved         |
//! | 56     | 8    | payload checksum |
//!
//! Reserved regions are written as zero and ignored on decode. The checksum
//! covers the payload only and is verified before a frame is handed out.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::frame::{Flags, Frame, FrameKind, PROTOCOL_VERSION};
use super::hash::checksum;

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 64;

/// Upper bound on a frame payload: 16 MiB.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Why a byte sequence failed to decode as a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes than a header
    #[error("buffer too short for a frame header: {0} bytes")]
    TooShort(usize),

    /// Version byte is not the supported protocol version
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// Kind byte is not a known frame kind
    #[error("unknown frame kind 0x{0:02X}")]
    UnknownKind(u8),

    /// Declared payload length exceeds the buffer or the 16 MiB cap
    #[error("declared payload length {declared} exceeds limit or buffer ({available} available)")]
    PayloadLengthOverflow {
        /// Length field from the header
        declared: usize,
        /// Payload bytes actually present after the header
        available: usize,
    },

    /// Recomputed payload checksum differs from the header field
    #[error("payload checksum mismatch: header {expected:#018x}, computed {actual:#018x}")]
    ChecksumMismatch {
        /// Checksum carried in the header
        expected: u64,
        /// Checksum computed over the received payload
        actual: u64,
    },
}

/// Decoded view of the fixed header, before the payload is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Wire format version
    pub version: u8,
    /// Frame kind
    pub kind: FrameKind,
    /// Flag bits
    pub flags: Flags,
    /// Priority byte
    pub priority: u8,
    /// Frame identifier
    pub message_id: u64,
    /// Trace identifier
    pub trace_id: u64,
    /// Correlation identifier
    pub correlation_id: u64,
    /// Declared payload length
    pub payload_len: u32,
    /// Declared payload checksum
    pub payload_checksum: u64,
}

/// Serialize a frame header into its 64-byte wire form.
pub fn encode_header(frame: &Frame) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    buf[0] = frame.version;
    buf[1] = frame.kind as u8;
    buf[2] = frame.flags.bits();
    buf[3] = frame.priority;
    buf[8..16].copy_from_slice(&frame.message_id.to_le_bytes());
    buf[16..24].copy_from_slice(&frame.trace_id.to_le_bytes());
    buf[24..32].copy_from_slice(&frame.correlation_id.to_le_bytes());
    buf[32..36].copy_from_slice(&(frame.payload.len() as u32).to_le_bytes());
    buf[56..64].copy_from_slice(&checksum(&frame.payload).to_le_bytes());
    buf
}

/// Serialize a frame into a contiguous byte sequence: header then payload.
pub fn encode(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + frame.payload.len());
    buf.put_slice(&encode_header(frame));
    buf.put_slice(&frame.payload);
    buf.freeze()
}

/// Parse the fixed header from the front of `bytes`.
///
/// Validates the version and kind bytes; payload length and checksum are
/// checked by [`decode`], which sees the payload.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::TooShort(bytes.len()));
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let kind = FrameKind::from_wire(bytes[1]).ok_or(DecodeError::UnknownKind(bytes[1]))?;

    Ok(FrameHeader {
        version,
        kind,
        flags: Flags::from_bits_truncate(bytes[2]),
        priority: bytes[3],
        message_id: u64::from_le_bytes(bytes[8..16].try_into().expect("slice is 8 bytes")),
        trace_id: u64::from_le_bytes(bytes[16..24].try_into().expect("slice is 8 bytes")),
        correlation_id: u64::from_le_bytes(bytes[24..32].try_into().expect("slice is 8 bytes")),
        payload_len: u32::from_le_bytes(bytes[32..36].try_into().expect("slice is 4 bytes")),
        payload_checksum: u64::from_le_bytes(bytes[56..64].try_into().expect("slice is 8 bytes")),
    })
}

/// Parse a full frame from `bytes`.
///
/// All identifiers are taken from the wire; in particular `message_id` is
/// preserved, never regenerated. Trailing bytes beyond the declared payload
/// length are ignored.
pub fn decode(bytes: &[u8]) -> Result<Frame, DecodeError> {
    let header = decode_header(bytes)?;

    let declared = header.payload_len as usize;
    let available = bytes.len() - HEADER_LEN;
    if declared > MAX_PAYLOAD_SIZE || declared > available {
        return Err(DecodeError::PayloadLengthOverflow {
            declared,
            available,
        });
    }

    let payload = &bytes[HEADER_LEN..HEADER_LEN + declared];
    let actual = checksum(payload);
    if actual != header.payload_checksum {
        return Err(DecodeError::ChecksumMismatch {
            expected: header.payload_checksum,
            actual,
        });
    }

    Ok(Frame {
        version: header.version,
        kind: header.kind,
        flags: header.flags,
        priority: header.priority,
        message_id: header.message_id,
        trace_id: header.trace_id,
        correlation_id: header.correlation_id,
        payload: Bytes::copy_from_slice(payload),
    })
}
