//! Lossless mapping between the A2A layer and MXP frames.
//!
//! A2A traffic rides in frame payloads as a small JSON envelope
//! `{ "method": …, "message"?: …, "task"?: … }`. Requests map onto Call
//! frames, streamed messages onto StreamOpen/StreamChunk/StreamClose, and
//! failures onto Error frames carrying `{ "error": { "code", "message" } }`.
//! A stream is identified throughout its lifetime by the opener's
//! `message_id`; there is no separate stream identifier.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{Message, Task};
use crate::wire::{Frame, FrameKind};

/// A2A method carried in the bridge envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Single request/response message exchange
    MessageSend,
    /// Streamed message exchange
    MessageStream,
    /// Submit a task
    TasksSend,
    /// Fetch a task by id
    TasksGet,
    /// Cancel a task
    TasksCancel,
}

impl Method {
    /// The wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::MessageSend => "message/send",
            Method::MessageStream => "message/stream",
            Method::TasksSend => "tasks/send",
            Method::TasksGet => "tasks/get",
            Method::TasksCancel => "tasks/cancel",
        }
    }

    /// The method implied by a frame kind when the envelope names none.
    fn implied_by(kind: FrameKind) -> Option<Method> {
        match kind {
            FrameKind::Call | FrameKind::Response | FrameKind::Error => Some(Method::MessageSend),
            FrameKind::StreamOpen | FrameKind::StreamChunk | FrameKind::StreamClose => {
                Some(Method::MessageStream)
            }
            _ => None,
        }
    }
}

impl FromStr for Method {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message/send" => Ok(Method::MessageSend),
            "message/stream" => Ok(Method::MessageStream),
            "tasks/send" => Ok(Method::TasksSend),
            "tasks/get" => Ok(Method::TasksGet),
            "tasks/cancel" => Ok(Method::TasksCancel),
            other => Err(BridgeError::UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an A2A payload could not cross the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Payload is not a valid envelope
    #[error("malformed bridge envelope: {0}")]
    MalformedEnvelope(String),

    /// Envelope names a method this layer does not know
    #[error("unknown A2A method {0:?}")]
    UnknownMethod(String),

    /// Envelope serialization failed
    #[error("envelope serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The JSON envelope carried in frame payloads.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    task: Option<Task>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<BridgeFault>,
}

/// Structured error carried by Error frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeFault {
    /// Numeric error code (JSON-RPC / A2A code space)
    pub code: i64,

    /// Human-readable message
    pub message: String,
}

/// An A2A payload recovered from a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeMessage {
    /// Method named by the envelope, or implied by the frame kind
    pub method: Method,

    /// Message carried by the envelope, if any
    pub message: Option<Message>,

    /// Task carried by the envelope, if any
    pub task: Option<Task>,

    /// Structured error for Error frames
    pub error: Option<BridgeFault>,

    /// The raw frame payload
    pub raw: Bytes,
}

fn envelope_frame(kind: FrameKind, envelope: &Envelope) -> Result<Frame, BridgeError> {
    let payload = serde_json::to_vec(envelope)?;
    Ok(Frame::new(kind, payload))
}

/// Wrap a message into a Call frame (`message/send`).
pub fn to_mxp(message: &Message) -> Result<Frame, BridgeError> {
    envelope_frame(
        FrameKind::Call,
        &Envelope {
            method: Some(Method::MessageSend.as_str().to_string()),
            message: Some(message.clone()),
            task: None,
            error: None,
        },
    )
}

/// Wrap a task operation into a Call frame (`tasks/send`, `tasks/get`,
/// `tasks/cancel`).
pub fn to_mxp_task(task: &Task, method: Method) -> Result<Frame, BridgeError> {
    envelope_frame(
        FrameKind::Call,
        &Envelope {
            method: Some(method.as_str().to_string()),
            message: None,
            task: Some(task.clone()),
            error: None,
        },
    )
}

/// Wrap a reply message into a Response frame correlated to `request`,
/// inheriting its trace.
pub fn respond(request: &Frame, message: &Message) -> Result<Frame, BridgeError> {
    let payload = serde_json::to_vec(&Envelope {
        method: Some(Method::MessageSend.as_str().to_string()),
        message: Some(message.clone()),
        task: None,
        error: None,
    })?;
    Ok(Frame::reply(request, payload))
}

/// Wrap a task snapshot into a Response frame correlated to `request`.
pub fn respond_task(request: &Frame, task: &Task) -> Result<Frame, BridgeError> {
    let payload = serde_json::to_vec(&Envelope {
        method: None,
        message: None,
        task: Some(task.clone()),
        error: None,
    })?;
    Ok(Frame::reply(request, payload))
}

/// Build an Error frame carrying a structured fault, correlated to the
/// failed request's `message_id`.
pub fn error_frame(code: i64, message: impl Into<String>, correlation_id: u64) -> Frame {
    let fault = serde_json::json!({
        "error": { "code": code, "message": message.into() }
    });
    // A literal envelope cannot fail to serialize.
    let payload = serde_json::to_vec(&fault).unwrap_or_default();
    Frame::error(payload, correlation_id)
}

/// Open a message stream. The returned frame's `message_id` is the stream
/// identifier.
pub fn to_mxp_stream_open(message: &Message) -> Result<Frame, BridgeError> {
    envelope_frame(
        FrameKind::StreamOpen,
        &Envelope {
            method: Some(Method::MessageStream.as_str().to_string()),
            message: Some(message.clone()),
            task: None,
            error: None,
        },
    )
}

/// A text chunk within the stream opened by `stream_id`. The chunk payload
/// is the raw UTF-8 text, not an envelope.
pub fn to_mxp_stream_chunk(chunk: &str, stream_id: u64) -> Frame {
    Frame::stream_chunk(chunk.as_bytes().to_vec(), stream_id)
}

/// Close the stream opened by `stream_id`.
pub fn to_mxp_stream_close(stream_id: u64) -> Frame {
    Frame::stream_close(stream_id)
}

/// Recover the A2A payload from a frame.
///
/// Stream chunks and closes carry raw payloads, so only their kind is
/// interpreted. Everything else must parse as an envelope; a missing
/// `method` falls back to the method implied by the frame kind.
pub fn from_mxp(frame: &Frame) -> Result<BridgeMessage, BridgeError> {
    if matches!(frame.kind, FrameKind::StreamChunk | FrameKind::StreamClose) {
        return Ok(BridgeMessage {
            method: Method::MessageStream,
            message: None,
            task: None,
            error: None,
            raw: frame.payload.clone(),
        });
    }

    let envelope: Envelope = serde_json::from_slice(&frame.payload)
        .map_err(|e| BridgeError::MalformedEnvelope(e.to_string()))?;

    let method = match envelope.method {
        Some(name) => name.parse()?,
        None => Method::implied_by(frame.kind).ok_or_else(|| {
            BridgeError::MalformedEnvelope(format!(
                "no method in envelope and none implied by {:?}",
                frame.kind
            ))
        })?,
    };

    Ok(BridgeMessage {
        method,
        message: envelope.message,
        task: envelope.task,
        error: envelope.error,
        raw: frame.payload.clone(),
    })
}
