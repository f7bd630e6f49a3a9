//! # MXP
//!
//! A binary message protocol for agent-to-agent communication.
//!
//! This crate provides the three layers of an MXP stack:
//!
//! - **Wire codec** ([`wire`]): a fixed 64-byte framed header plus payload
//!   with integrity checking, bit-exact across implementations.
//! - **A2A semantic layer** ([`protocol`], [`bridge`], [`rpc`]): the
//!   message/task/artifact/agent-card model and its lossless mapping onto
//!   MXP frames.
//! - **Peer transport** ([`signaling`], [`transport`]): per-peer handshake
//!   state machines over datagram channels, with multi-peer dispatch and
//!   heartbeat liveness.
//!
//! ## Example
//!
//! ```rust
//! use mxp::prelude::*;
//!
//! // Wrap an A2A message into a frame and push it through the codec.
//! let message = Message::user_text("Hello, agent!");
//! let frame = mxp::bridge::to_mxp(&message)?;
//!
//! let bytes = mxp::wire::encode(&frame);
//! let decoded = mxp::wire::decode(&bytes)?;
//! assert_eq!(decoded, frame);
//!
//! let recovered = mxp::bridge::from_mxp(&decoded)?;
//! assert_eq!(recovered.message.unwrap().text_content(), "Hello, agent!");
//! # Ok::<(), mxp::MxpError>(())
//! ```

#![warn(missing_docs)]

pub mod bridge;
pub mod error;
pub mod protocol;
pub mod rpc;
pub mod signaling;
pub mod transport;
pub mod wire;

pub use error::{MxpError, MxpResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bridge::{from_mxp, to_mxp, BridgeMessage, Method};
    pub use crate::error::{MxpError, MxpResult};
    pub use crate::protocol::{
        AgentCard, Artifact, Message, Part, Role, Task, TaskState, TaskStatus,
    };
    pub use crate::signaling::{SignalKind, SignalMessage, SignalingProvider};
    pub use crate::transport::{Mesh, MeshEvent, PeerConfig, PeerState};
    pub use crate::wire::{decode, encode, Flags, Frame, FrameKind};
}
