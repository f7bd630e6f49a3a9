//! Peer-connection transport: per-peer state machines over datagram
//! channels, a multi-peer dispatcher, and the narrow interface both
//! consume from the host environment.

pub mod channel;
pub mod memory;
pub mod mesh;
pub mod peer;

pub use channel::{
    ChannelEvent, ChannelHandle, ChannelMode, ConnectionEvent, ConnectionState, DataChannel,
    PeerConnection, PeerConnector, SessionDescription,
};
pub use memory::{MemoryConnector, MemoryNetwork};
pub use mesh::{Mesh, MeshEvent, MeshStats};
pub use peer::{Peer, PeerConfig, PeerEvent, PeerRole, PeerState, PeerStats};

use thiserror::Error;

use crate::signaling::SignalingError;

/// Errors surfaced by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The data channel is not open
    #[error("data channel is closed")]
    ChannelClosed,

    /// No peer entry under that id
    #[error("unknown peer {0:?}")]
    UnknownPeer(String),

    /// The peer exists but is not in the Connected state
    #[error("peer {0:?} is not connected")]
    NotConnected(String),

    /// The handshake reached the Failed state
    #[error("handshake with peer {0:?} failed")]
    HandshakeFailed(String),

    /// The connection attempt outlived its timeout
    #[error("timed out connecting to peer {0:?}")]
    Timeout(String),

    /// The underlying peer-connection library reported a failure
    #[error("peer connection: {0}")]
    Connection(String),

    /// Signaling failed while the handshake depended on it
    #[error(transparent)]
    Signaling(#[from] SignalingError),
}
