//! The narrow interface onto the host's peer-connection facility.
//!
//! The mesh never talks to a concrete networking stack; it drives these
//! traits. A backend wraps whatever supplies encrypted datagram channels
//! (a WebRTC binding, a QUIC session, the in-memory pair in
//! [`memory`](super::memory)) and surfaces its events on `mpsc` receivers
//! handed out at construction.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::TransportError;

/// Session description blob exchanged during the handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescription {
    /// `"offer"` or `"answer"`
    pub sdp_type: String,

    /// Opaque description payload
    pub sdp: String,
}

impl SessionDescription {
    /// An offer description.
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: "offer".to_string(),
            sdp: sdp.into(),
        }
    }

    /// An answer description.
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: "answer".to_string(),
            sdp: sdp.into(),
        }
    }
}

/// Connection state reported by the underlying peer-connection library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, handshake not started
    New,
    /// Handshake in progress
    Connecting,
    /// Datagram path established
    Connected,
    /// Datagram path lost
    Disconnected,
    /// Handshake or transport failed permanently
    Failed,
    /// Shut down
    Closed,
}

/// Delivery mode requested for a data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    /// Ordered and reliable
    #[default]
    Reliable,
    /// Zero retransmits; messages may be dropped
    Unreliable,
}

/// Events emitted by a [`PeerConnection`].
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A local transport candidate to forward over signaling
    IceCandidate(Value),

    /// The underlying connection changed state
    StateChange(ConnectionState),

    /// The remote side opened a data channel toward us
    DataChannel(ChannelHandle),
}

/// Events emitted by a [`DataChannel`].
#[derive(Debug)]
pub enum ChannelEvent {
    /// The channel became usable
    Open,

    /// A binary message arrived
    Message(Bytes),

    /// The channel closed
    Closed,
}

/// A data channel plus the receiver for its events.
#[derive(Debug)]
pub struct ChannelHandle {
    /// The channel itself
    pub channel: Arc<dyn DataChannel>,

    /// Taken-once event stream
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// One bidirectional peer connection supplied by the host environment.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Produce a session offer.
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    /// Produce a session answer to a previously applied remote offer.
    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    /// Apply the local description.
    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError>;

    /// Apply the remote description.
    async fn set_remote_description(&self, desc: SessionDescription)
        -> Result<(), TransportError>;

    /// Apply a remote transport candidate.
    async fn add_ice_candidate(&self, candidate: Value) -> Result<(), TransportError>;

    /// Open a data channel. Only the initiating side calls this; the
    /// responder receives the channel via [`ConnectionEvent::DataChannel`].
    async fn create_data_channel(
        &self,
        label: &str,
        mode: ChannelMode,
    ) -> Result<ChannelHandle, TransportError>;

    /// Tear the connection down. Idempotent.
    async fn close(&self);
}

/// A bidirectional binary datagram channel.
#[async_trait]
pub trait DataChannel: Send + Sync + std::fmt::Debug {
    /// The channel label agreed during setup.
    fn label(&self) -> &str;

    /// Whether the channel is currently open.
    fn is_open(&self) -> bool;

    /// Send one binary message.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Close the channel. Idempotent.
    async fn close(&self);
}

/// Factory for fresh peer connections, one per remote peer.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Create an unconnected peer connection and its event stream.
    async fn create(
        &self,
    ) -> Result<
        (
            Arc<dyn PeerConnection>,
            mpsc::UnboundedReceiver<ConnectionEvent>,
        ),
        TransportError,
    >;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_description_serialization() {
        let offer = SessionDescription::offer("blob");
        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["sdpType"], "offer");
        assert_eq!(json["sdp"], "blob");

        let back: SessionDescription = serde_json::from_value(json).unwrap();
        assert_eq!(back, offer);
        assert_eq!(SessionDescription::answer("x").sdp_type, "answer");
    }

    #[test]
    fn test_channel_mode_default_is_reliable() {
        assert_eq!(ChannelMode::default(), ChannelMode::Reliable);
    }
}
