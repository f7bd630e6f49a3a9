//! Wire-format compliance tests
//!
//! These pin the behaviors every MXP implementation must agree on: the
//! header layout, checksum coverage, id preservation, and the factory
//! helper laws.

use mxp::wire::{
    checksum, decode, decode_header, encode, DecodeError, Flags, Frame, FrameKind, HEADER_LEN,
    MAX_PAYLOAD_SIZE,
};

#[test]
fn test_round_trip_preserves_all_header_fields() {
    let frame = Frame::call(&b"Hello, world!"[..])
        .with_flags(Flags::ENCRYPTED | Flags::REQUIRES_ACK)
        .with_priority(42);

    let bytes = encode(&frame);
    assert_eq!(bytes.len(), HEADER_LEN + 13);

    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded.version, frame.version);
    assert_eq!(decoded.kind, frame.kind);
    assert_eq!(decoded.flags, frame.flags);
    assert_eq!(decoded.priority, frame.priority);
    assert_eq!(decoded.message_id, frame.message_id);
    assert_eq!(decoded.trace_id, frame.trace_id);
    assert_eq!(decoded.correlation_id, frame.correlation_id);
    assert_eq!(decoded.payload, frame.payload);
}

#[test]
fn test_round_trip_every_kind() {
    let cause = Frame::call(&b"cause"[..]);
    let open = Frame::stream_open(&b"open"[..]);
    let ping = Frame::ping();

    let frames = vec![
        cause.clone(),
        Frame::response(&b"r"[..], cause.message_id),
        Frame::error(&b"e"[..], cause.message_id),
        Frame::notify(&b"n"[..]),
        open.clone(),
        Frame::stream_chunk(&b"c"[..], open.message_id),
        Frame::stream_close(open.message_id),
        Frame::agent_register(&b"reg"[..]),
        Frame::agent_discover(&b"disc"[..]),
        Frame::agent_heartbeat(&b"hb"[..]),
        ping.clone(),
        Frame::pong(&ping),
    ];

    for frame in frames {
        let decoded = decode(&encode(&frame)).unwrap();
        assert_eq!(decoded, frame, "round trip broke for {:?}", frame.kind);
    }
}

#[test]
fn test_encoded_length_is_header_plus_payload() {
    for len in [0usize, 1, 13, 100, 4096] {
        let frame = Frame::notify(vec![0xAB; len]);
        assert_eq!(encode(&frame).len(), HEADER_LEN + len);
    }
}

#[test]
fn test_golden_header_bytes() {
    // A fully pinned frame must produce exactly these bytes, so a second
    // implementation can be checked against them.
    let frame = Frame {
        version: 1,
        kind: FrameKind::Call,
        flags: Flags::REQUIRES_ACK,
        priority: 5,
        message_id: 0x1122_3344_5566_7788,
        trace_id: 0x99AA_BBCC_DDEE_FF00,
        correlation_id: 0,
        payload: bytes::Bytes::from_static(b"MXP"),
    };

    let bytes = encode(&frame);
    let mut expected = vec![
        0x01, 0x01, 0x04, 0x05, // version, kind, flags, priority
        0x00, 0x00, 0x00, 0x00, // reserved
        0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, // message id
        0x00, 0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA, 0x99, // trace id
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // correlation id
        0x03, 0x00, 0x00, 0x00, // payload length
    ];
    expected.extend_from_slice(&[0u8; 20]); // reserved
    expected.extend_from_slice(&checksum(b"MXP").to_le_bytes());
    expected.extend_from_slice(b"MXP");

    assert_eq!(&bytes[..], &expected[..]);
}

#[test]
fn test_checksum_interop_vectors() {
    assert_eq!(checksum(b"MXP"), 8_544_294_773_952_050_414);
    assert_eq!(checksum(b"Hello, world!"), 5_302_487_261_585_490_398);
}

#[test]
fn test_tampered_payload_fails_checksum() {
    let frame = Frame::call(&b"tamper target"[..]);
    let mut bytes = encode(&frame).to_vec();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    assert!(matches!(
        decode(&bytes),
        Err(DecodeError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_decode_error_taxonomy() {
    assert!(matches!(
        decode(&[0u8; 63]),
        Err(DecodeError::TooShort(63))
    ));

    let mut wrong_version = encode(&Frame::ping()).to_vec();
    wrong_version[0] = 9;
    assert!(matches!(
        decode(&wrong_version),
        Err(DecodeError::UnsupportedVersion(9))
    ));

    let mut oversize = encode(&Frame::ping()).to_vec();
    oversize[32..36].copy_from_slice(&((MAX_PAYLOAD_SIZE as u32) + 1).to_le_bytes());
    assert!(matches!(
        decode(&oversize),
        Err(DecodeError::PayloadLengthOverflow { .. })
    ));
}

#[test]
fn test_decode_header_alone() {
    let frame = Frame::notify(&b"header check"[..]).with_priority(3);
    let bytes = encode(&frame);

    let header = decode_header(&bytes[..HEADER_LEN]).unwrap();
    assert_eq!(header.kind, FrameKind::Notify);
    assert_eq!(header.priority, 3);
    assert_eq!(header.message_id, frame.message_id);
    assert_eq!(header.payload_len, 12);
    assert_eq!(header.payload_checksum, checksum(b"header check"));
}

#[test]
fn test_trace_flows_through_derivation_chain() {
    let request = Frame::call(&b"start"[..]);
    let response = Frame::reply(&request, &b"mid"[..]);
    let ping = Frame::ping();
    let pong = Frame::pong(&ping);

    assert_eq!(response.trace_id, request.trace_id);
    assert_eq!(pong.trace_id, ping.trace_id);

    // And the trace survives the wire.
    let decoded = decode(&encode(&response)).unwrap();
    assert_eq!(decoded.trace_id, request.trace_id);
}

#[test]
fn test_streaming_and_response_queries() {
    let open = Frame::stream_open(&b"s"[..]);
    assert!(open.is_streaming());
    assert!(Frame::stream_chunk(&b"c"[..], open.message_id).is_streaming());
    assert!(Frame::stream_close(open.message_id).is_streaming());

    assert!(!Frame::call(&b"x"[..]).is_streaming());
    assert!(!Frame::ping().is_streaming());

    assert!(Frame::call(&b"x"[..]).requires_response());
    assert!(Frame::ping().requires_response());
    assert!(!Frame::notify(&b"x"[..]).requires_response());
    assert!(!open.requires_response());
}
