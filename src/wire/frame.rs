//! The typed frame value and its factory helpers.

use bytes::Bytes;

use super::hash::random_id;

/// Protocol version carried in every header.
pub const PROTOCOL_VERSION: u8 = 1;

/// Kind of an MXP frame.
///
/// The discriminants are the wire values; they are shared with every other
/// MXP implementation and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Request that expects a response
    Call = 0x01,

    /// Successful reply to a Call
    Response = 0x02,

    /// Failed reply to a Call
    Error = 0x03,

    /// One-way notification
    Notify = 0x04,

    /// Opens a stream; its `message_id` identifies the stream
    StreamOpen = 0x10,

    /// Payload chunk within a stream
    StreamChunk = 0x11,

    /// Terminates a stream
    StreamClose = 0x12,

    /// Agent registration with a registry
    AgentRegister = 0x20,

    /// Agent discovery query
    AgentDiscover = 0x21,

    /// Agent liveness report to a registry
    AgentHeartbeat = 0x22,

    /// Connection liveness probe
    Ping = 0xF0,

    /// Reply to a Ping
    Pong = 0xF1,
}

impl FrameKind {
    /// Parse a wire kind byte.
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Call),
            0x02 => Some(Self::Response),
            0x03 => Some(Self::Error),
            0x04 => Some(Self::Notify),
            0x10 => Some(Self::StreamOpen),
            0x11 => Some(Self::StreamChunk),
            0x12 => Some(Self::StreamClose),
            0x20 => Some(Self::AgentRegister),
            0x21 => Some(Self::AgentDiscover),
            0x22 => Some(Self::AgentHeartbeat),
            0xF0 => Some(Self::Ping),
            0xF1 => Some(Self::Pong),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Frame flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u8 {
        /// Payload is encrypted by a layer above the codec
        const ENCRYPTED = 0x01;
        /// Payload is compressed
        const COMPRESSED = 0x02;
        /// Receiver must acknowledge delivery
        const REQUIRES_ACK = 0x04;
        /// Frame is a retransmission
        const RETRANSMIT = 0x08;
        /// Frame should jump send queues
        const HIGH_PRIORITY = 0x10;
    }
}

/// A single MXP message: what goes on the wire as a 64-byte header plus
/// payload.
///
/// Frames are immutable once sent. `message_id` is assigned at construction
/// and preserved verbatim through encode/decode; `trace_id` flows from a
/// frame to every frame causally derived from it; `correlation_id` links a
/// response-like frame back to the `message_id` that caused it (zero means
/// none).
///
/// Payloads must not exceed [`MAX_PAYLOAD_SIZE`](super::MAX_PAYLOAD_SIZE);
/// the decoder rejects anything larger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Wire format version, always [`PROTOCOL_VERSION`]
    pub version: u8,

    /// What this frame is
    pub kind: FrameKind,

    /// Flag bits
    pub flags: Flags,

    /// Scheduling priority, 0 lowest
    pub priority: u8,

    /// Unique identifier of this frame
    pub message_id: u64,

    /// Identifier shared by all frames derived from one originating request
    pub trace_id: u64,

    /// `message_id` of the frame being answered, or zero
    pub correlation_id: u64,

    /// Application payload
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame with fresh `message_id` and `trace_id`.
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind,
            flags: Flags::empty(),
            priority: 0,
            message_id: random_id(),
            trace_id: random_id(),
            correlation_id: 0,
            payload: payload.into(),
        }
    }

    /// A request expecting a response.
    pub fn call(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Call, payload)
    }

    /// A successful reply correlated to `correlation_id`.
    ///
    /// The trace is fresh; use [`Frame::with_trace`] (or
    /// [`Frame::reply`]) to carry the cause's trace across.
    pub fn response(payload: impl Into<Bytes>, correlation_id: u64) -> Self {
        Self::new(FrameKind::Response, payload).with_correlation(correlation_id)
    }

    /// A failure reply correlated to `correlation_id`.
    pub fn error(payload: impl Into<Bytes>, correlation_id: u64) -> Self {
        Self::new(FrameKind::Error, payload).with_correlation(correlation_id)
    }

    /// A successful reply derived from the request frame itself: inherits
    /// the request's trace and correlates to its `message_id`.
    pub fn reply(cause: &Frame, payload: impl Into<Bytes>) -> Self {
        Self::response(payload, cause.message_id).with_trace(cause.trace_id)
    }

    /// A failure reply derived from the request frame itself.
    pub fn reply_error(cause: &Frame, payload: impl Into<Bytes>) -> Self {
        Self::error(payload, cause.message_id).with_trace(cause.trace_id)
    }

    /// A one-way notification.
    pub fn notify(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Notify, payload)
    }

    /// Opens a stream. The returned frame's `message_id` is the stream
    /// identifier for every subsequent chunk and the close.
    pub fn stream_open(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::StreamOpen, payload)
    }

    /// A chunk within the stream opened by `stream_id`.
    pub fn stream_chunk(payload: impl Into<Bytes>, stream_id: u64) -> Self {
        Self::new(FrameKind::StreamChunk, payload).with_correlation(stream_id)
    }

    /// Terminates the stream opened by `stream_id`.
    pub fn stream_close(stream_id: u64) -> Self {
        Self::new(FrameKind::StreamClose, Bytes::new()).with_correlation(stream_id)
    }

    /// Registration announcement for an agent registry.
    pub fn agent_register(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::AgentRegister, payload)
    }

    /// Discovery query against an agent registry.
    pub fn agent_discover(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::AgentDiscover, payload)
    }

    /// Liveness report to an agent registry.
    pub fn agent_heartbeat(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::AgentHeartbeat, payload)
    }

    /// A liveness probe.
    pub fn ping() -> Self {
        Self::new(FrameKind::Ping, Bytes::new())
    }

    /// The reply to `ping`: correlated to its `message_id`, same trace.
    pub fn pong(ping: &Frame) -> Self {
        Self::new(FrameKind::Pong, Bytes::new())
            .with_correlation(ping.message_id)
            .with_trace(ping.trace_id)
    }

    /// Set the correlation id.
    pub fn with_correlation(mut self, correlation_id: u64) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Adopt the trace of a causing frame.
    pub fn with_trace(mut self, trace_id: u64) -> Self {
        self.trace_id = trace_id;
        self
    }

    /// Set flag bits.
    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the priority byte.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Whether this frame is part of a stream.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self.kind,
            FrameKind::StreamOpen | FrameKind::StreamChunk | FrameKind::StreamClose
        )
    }

    /// Whether the sender expects a reply to this frame.
    pub fn requires_response(&self) -> bool {
        matches!(self.kind, FrameKind::Call | FrameKind::Ping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_defaults() {
        let frame = Frame::call(&b"hello"[..]);
        assert_eq!(frame.version, PROTOCOL_VERSION);
        assert_eq!(frame.kind, FrameKind::Call);
        assert_eq!(frame.correlation_id, 0);
        assert_eq!(frame.flags, Flags::empty());
        assert!(frame.requires_response());
        assert!(!frame.is_streaming());
    }

    #[test]
    fn test_ping_pong_correlation() {
        let ping = Frame::ping();
        assert_eq!(ping.correlation_id, 0);
        assert!(ping.payload.is_empty());

        let pong = Frame::pong(&ping);
        assert_eq!(pong.correlation_id, ping.message_id);
        assert_eq!(pong.trace_id, ping.trace_id);
        assert!(pong.payload.is_empty());
        assert!(!pong.requires_response());
    }

    #[test]
    fn test_reply_inherits_trace() {
        let request = Frame::call(&b"req"[..]);
        let response = Frame::reply(&request, &b"ok"[..]);
        assert_eq!(response.kind, FrameKind::Response);
        assert_eq!(response.correlation_id, request.message_id);
        assert_eq!(response.trace_id, request.trace_id);
        assert_ne!(response.message_id, request.message_id);

        let fault = Frame::reply_error(&request, &b"boom"[..]);
        assert_eq!(fault.kind, FrameKind::Error);
        assert_eq!(fault.trace_id, request.trace_id);
    }

    #[test]
    fn test_stream_grouping() {
        let open = Frame::stream_open(&b"start"[..]);
        let chunk = Frame::stream_chunk(&b"a"[..], open.message_id);
        let close = Frame::stream_close(open.message_id);

        assert_eq!(chunk.correlation_id, open.message_id);
        assert_eq!(close.correlation_id, open.message_id);
        assert!(close.payload.is_empty());

        assert!(open.is_streaming());
        assert!(chunk.is_streaming());
        assert!(close.is_streaming());
        assert!(!Frame::notify(&b"x"[..]).is_streaming());
    }

    #[test]
    fn test_kind_wire_values() {
        assert_eq!(FrameKind::Call as u8, 0x01);
        assert_eq!(FrameKind::StreamOpen as u8, 0x10);
        assert_eq!(FrameKind::AgentRegister as u8, 0x20);
        assert_eq!(FrameKind::AgentHeartbeat as u8, 0x22);
        assert_eq!(FrameKind::Ping as u8, 0xF0);
        assert_eq!(FrameKind::Pong as u8, 0xF1);

        for kind in [
            FrameKind::Call,
            FrameKind::Response,
            FrameKind::Error,
            FrameKind::Notify,
            FrameKind::StreamOpen,
            FrameKind::StreamChunk,
            FrameKind::StreamClose,
            FrameKind::AgentRegister,
            FrameKind::AgentDiscover,
            FrameKind::AgentHeartbeat,
            FrameKind::Ping,
            FrameKind::Pong,
        ] {
            assert_eq!(FrameKind::from_wire(kind as u8), Some(kind));
        }
        assert_eq!(FrameKind::from_wire(0x7F), None);
    }

    #[test]
    fn test_flag_bits() {
        assert_eq!(Flags::ENCRYPTED.bits(), 0x01);
        assert_eq!(Flags::COMPRESSED.bits(), 0x02);
        assert_eq!(Flags::REQUIRES_ACK.bits(), 0x04);
        assert_eq!(Flags::RETRANSMIT.bits(), 0x08);
        assert_eq!(Flags::HIGH_PRIORITY.bits(), 0x10);

        let frame = Frame::call(&b"x"[..]).with_flags(Flags::REQUIRES_ACK | Flags::HIGH_PRIORITY);
        assert_eq!(frame.flags.bits(), 0x14);
    }
}
