//! Manual signaling for embedding and tests: the caller carries the bytes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{SignalMessage, SignalingError, SignalingProvider};

/// A provider whose transport is the caller.
///
/// Outgoing messages are handed to the sink supplied at construction;
/// inbound messages are injected with [`ManualSignaling::receive`]. Useful
/// when signaling rides an existing channel (a QR code, a copy-paste flow,
/// an already-connected socket).
pub struct ManualSignaling {
    id: String,
    sink: mpsc::UnboundedSender<SignalMessage>,
    inbound: mpsc::UnboundedSender<SignalMessage>,
}

impl ManualSignaling {
    /// Create a provider that forwards outgoing messages to `sink`.
    /// Returns the provider and the inbound receiver.
    pub fn new(
        id: impl Into<String>,
        sink: mpsc::UnboundedSender<SignalMessage>,
    ) -> (Self, mpsc::UnboundedReceiver<SignalMessage>) {
        let (inbound, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: id.into(),
                sink,
                inbound,
            },
            rx,
        )
    }

    /// Inject a message received out of band.
    pub fn receive(&self, msg: SignalMessage) -> Result<(), SignalingError> {
        self.inbound.send(msg).map_err(|_| SignalingError::Closed)
    }
}

#[async_trait]
impl SignalingProvider for ManualSignaling {
    fn local_id(&self) -> &str {
        &self.id
    }

    async fn send(&self, msg: SignalMessage) -> Result<(), SignalingError> {
        self.sink.send(msg).map_err(|_| SignalingError::Closed)
    }
}
