//! Same-origin broadcast signaling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{SignalMessage, SignalingError, SignalingProvider};

type Endpoints = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<SignalMessage>>>>;

/// A shared bus delivering to every attached endpoint in the same process.
///
/// A message reaches the endpoints whose local id equals `msg.to`, or every
/// endpoint other than the sender when `msg.to == "*"`.
#[derive(Clone, Default)]
pub struct BroadcastBus {
    endpoints: Endpoints,
}

impl BroadcastBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `id`, returning its provider and inbound receiver.
    pub fn attach(
        &self,
        id: impl Into<String>,
    ) -> (BroadcastSignaling, mpsc::UnboundedReceiver<SignalMessage>) {
        let id = id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.endpoints
            .lock()
            .expect("bus endpoints poisoned")
            .insert(id.clone(), tx);
        (
            BroadcastSignaling {
                id,
                endpoints: self.endpoints.clone(),
            },
            rx,
        )
    }
}

/// A peer's handle onto a [`BroadcastBus`].
pub struct BroadcastSignaling {
    id: String,
    endpoints: Endpoints,
}

#[async_trait]
impl SignalingProvider for BroadcastSignaling {
    fn local_id(&self) -> &str {
        &self.id
    }

    async fn send(&self, msg: SignalMessage) -> Result<(), SignalingError> {
        let endpoints = self.endpoints.lock().expect("bus endpoints poisoned");
        if msg.to == "*" {
            for (id, tx) in endpoints.iter() {
                if id != &msg.from {
                    let _ = tx.send(msg.clone());
                }
            }
        } else if let Some(tx) = endpoints.get(&msg.to) {
            let _ = tx.send(msg);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::SignalKind;
    use super::*;

    fn offer(from: &str, to: &str) -> SignalMessage {
        SignalMessage::new(SignalKind::Offer, from, to, serde_json::Value::Null)
    }

    #[tokio::test]
    async fn test_exact_match_delivery() {
        let bus = BroadcastBus::new();
        let (a, _ra) = bus.attach("a");
        let (_b, mut rb) = bus.attach("b");
        let (_c, mut rc) = bus.attach("c");

        a.send(offer("a", "b")).await.unwrap();

        assert_eq!(rb.recv().await.unwrap().to, "b");
        assert!(rc.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_star_reaches_everyone_but_sender() {
        let bus = BroadcastBus::new();
        let (a, mut ra) = bus.attach("a");
        let (_b, mut rb) = bus.attach("b");
        let (_c, mut rc) = bus.attach("c");

        a.send(offer("a", "*")).await.unwrap();

        assert!(rb.recv().await.is_some());
        assert!(rc.recv().await.is_some());
        assert!(ra.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unmatched_recipient_is_silent() {
        let bus = BroadcastBus::new();
        let (a, _ra) = bus.attach("a");
        // Nothing to deliver to, but same-origin broadcast is fire-and-forget.
        a.send(offer("a", "nobody")).await.unwrap();
    }
}
