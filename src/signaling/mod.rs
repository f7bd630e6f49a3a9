//! Out-of-band signaling: offer/answer/candidate exchange between peers.
//!
//! Signaling never touches the frame codec; it carries the small opaque
//! blobs the peer-connection layer needs to establish a data channel.
//! A provider can send a [`SignalMessage`] toward a peer id and surfaces
//! inbound messages on an `mpsc` receiver handed out at construction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod broadcast;
pub mod hub;
pub mod manual;
pub mod socket;

pub use broadcast::BroadcastBus;
pub use hub::SignalingHub;
pub use manual::ManualSignaling;
pub use socket::{SocketConfig, SocketSignaling};

/// Kind of a signaling message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    /// Session offer from the initiating side
    Offer,

    /// Session answer from the responding side
    Answer,

    /// Transport address candidate
    IceCandidate,

    /// The sender is tearing the session down
    Hangup,
}

/// A message exchanged over the signaling side channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalMessage {
    /// What the message is
    pub kind: SignalKind,

    /// Peer id of the sender
    pub from: String,

    /// Peer id of the recipient (`"*"` broadcasts where supported)
    pub to: String,

    /// Opaque blob supplied by the peer-connection layer
    #[serde(default)]
    pub payload: Value,
}

impl SignalMessage {
    /// Build a signaling message.
    pub fn new(
        kind: SignalKind,
        from: impl Into<String>,
        to: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            kind,
            from: from.into(),
            to: to.into(),
            payload,
        }
    }
}

/// Errors from signaling providers.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// The recipient is not reachable through this provider
    #[error("no signaling route to peer {0:?}")]
    UnknownPeer(String),

    /// The provider has no live connection to its relay
    #[error("signaling transport is not connected")]
    NotConnected,

    /// The provider was shut down
    #[error("signaling provider is closed")]
    Closed,

    /// Underlying transport failure
    #[error("signaling transport: {0}")]
    Transport(String),

    /// Message serialization failed
    #[error("signaling serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Something that can deliver signaling messages toward other peers.
///
/// Inbound traffic is not part of the trait: every backend returns an
/// `mpsc::UnboundedReceiver<SignalMessage>` from its constructor, which the
/// owner polls from its event loop.
#[async_trait]
pub trait SignalingProvider: Send + Sync {
    /// The peer id this provider signals as.
    fn local_id(&self) -> &str;

    /// Deliver a message toward `msg.to`.
    async fn send(&self, msg: SignalMessage) -> Result<(), SignalingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_message_serialization() {
        let msg = SignalMessage::new(
            SignalKind::Offer,
            "alice",
            "bob",
            serde_json::json!({"sdpType": "offer", "sdp": "blob"}),
        );

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "offer");
        assert_eq!(json["from"], "alice");
        assert_eq!(json["to"], "bob");
        assert_eq!(json["payload"]["sdp"], "blob");

        let back: SignalMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_signal_kind_names() {
        assert_eq!(
            serde_json::to_value(SignalKind::IceCandidate).unwrap(),
            "iceCandidate"
        );
        assert_eq!(serde_json::to_value(SignalKind::Hangup).unwrap(), "hangup");
    }

    #[test]
    fn test_payload_defaults_to_null() {
        let msg: SignalMessage = serde_json::from_str(
            r#"{"kind": "hangup", "from": "a", "to": "b"}"#,
        )
        .unwrap();
        assert!(msg.payload.is_null());
    }
}
