//! Process-local signaling hub for tests and embedded meshes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{SignalMessage, SignalingError, SignalingProvider};

type Registry = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<SignalMessage>>>>;

/// An in-process registry mapping peer ids to inboxes.
///
/// Delivery is scheduled on the runtime rather than performed inline, so a
/// send never re-enters the recipient's handler on the sender's stack.
#[derive(Clone, Default)]
pub struct SignalingHub {
    registry: Registry,
}

impl SignalingHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` on the hub, returning its provider and inbound
    /// receiver. Re-attaching an id replaces the previous registration.
    pub fn attach(
        &self,
        id: impl Into<String>,
    ) -> (HubSignaling, mpsc::UnboundedReceiver<SignalMessage>) {
        let id = id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry
            .lock()
            .expect("hub registry poisoned")
            .insert(id.clone(), tx);
        (
            HubSignaling {
                id,
                registry: self.registry.clone(),
            },
            rx,
        )
    }
}

/// A peer's handle onto a [`SignalingHub`].
pub struct HubSignaling {
    id: String,
    registry: Registry,
}

impl HubSignaling {
    /// Remove this peer from the hub.
    pub fn detach(&self) {
        self.registry
            .lock()
            .expect("hub registry poisoned")
            .remove(&self.id);
    }
}

#[async_trait]
impl SignalingProvider for HubSignaling {
    fn local_id(&self) -> &str {
        &self.id
    }

    async fn send(&self, msg: SignalMessage) -> Result<(), SignalingError> {
        let target = {
            let registry = self.registry.lock().expect("hub registry poisoned");
            registry.get(&msg.to).cloned()
        };
        let tx = target.ok_or_else(|| SignalingError::UnknownPeer(msg.to.clone()))?;

        // Queued for the recipient's event loop, never handled on this
        // stack, and kept in send order.
        let _ = tx.send(msg);
        Ok(())
    }
}
