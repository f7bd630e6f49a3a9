//! Multi-peer dispatch: one [`Mesh`] per local agent.
//!
//! The mesh owns the peer map, routes inbound signaling to the right
//! [`Peer`], establishes outbound connections, fans frames out, and keeps
//! traffic counters. All peer-map mutation happens behind one lock owned
//! here; peers themselves never touch it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::signaling::{SignalKind, SignalMessage, SignalingProvider};
use crate::wire::{encode, Frame};

use super::peer::{Peer, PeerConfig, PeerEvent, PeerRole, PeerState};
use super::channel::PeerConnector;
use super::TransportError;

/// Events a mesh surfaces to the application.
#[derive(Debug)]
pub enum MeshEvent {
    /// A peer reached the Connected state
    PeerConnected(String),

    /// A peer left the Connected state
    PeerDisconnected(String),

    /// A frame arrived from a peer
    Message {
        /// Sending peer id
        peer_id: String,
        /// The decoded frame
        frame: Frame,
    },

    /// A non-fatal per-peer fault
    Error {
        /// Peer the fault belongs to
        peer_id: String,
        /// What went wrong
        detail: String,
    },
}

/// Immutable traffic snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    /// Frames sent to peers
    pub messages_sent: u64,

    /// Application frames received from peers
    pub messages_received: u64,

    /// Encoded bytes sent
    pub bytes_sent: u64,

    /// Encoded bytes received
    pub bytes_received: u64,

    /// Peers currently in the Connected state
    pub peers_connected: usize,
}

#[derive(Default)]
struct Counters {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

struct MeshInner {
    local_id: String,
    signaling: Arc<dyn SignalingProvider>,
    connector: Arc<dyn PeerConnector>,
    config: PeerConfig,
    peers: Mutex<HashMap<String, Peer>>,
    counters: Counters,
    events: mpsc::UnboundedSender<MeshEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Connects to, routes between, and fans out to many peers.
#[derive(Clone)]
pub struct Mesh {
    inner: Arc<MeshInner>,
}

impl Mesh {
    /// Build a mesh over a signaling provider and a connection factory.
    ///
    /// `signals` is the provider's inbound receiver; the mesh consumes it
    /// from a background task. Returns the mesh and its event receiver.
    pub fn new(
        signaling: Arc<dyn SignalingProvider>,
        signals: mpsc::UnboundedReceiver<SignalMessage>,
        connector: Arc<dyn PeerConnector>,
        config: PeerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<MeshEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(MeshInner {
            local_id: signaling.local_id().to_string(),
            signaling,
            connector,
            config,
            peers: Mutex::new(HashMap::new()),
            counters: Counters::default(),
            events,
            tasks: Mutex::new(Vec::new()),
        });

        let router = tokio::spawn(route_signals(inner.clone(), signals));
        inner.tasks.lock().expect("mesh tasks poisoned").push(router);

        (Self { inner }, events_rx)
    }

    /// The id this mesh signals as.
    pub fn local_id(&self) -> &str {
        &self.inner.local_id
    }

    /// Establish a connection to `peer_id` and wait for it to come up.
    ///
    /// An already-Connected peer is reused. A peer in any other state is
    /// closed and replaced. Fails with [`TransportError::Timeout`] after
    /// the configured connection timeout and with
    /// [`TransportError::HandshakeFailed`] if the handshake dies first.
    pub async fn connect(&self, peer_id: impl Into<String>) -> Result<(), TransportError> {
        let peer_id = peer_id.into();

        if let Some(existing) = self.inner.peer(&peer_id) {
            if existing.state() == PeerState::Connected {
                return Ok(());
            }
            self.inner.remove(&peer_id);
            existing.close().await;
        }

        let peer = self.inner.spawn_peer(&peer_id, PeerRole::Initiator).await?;
        let mut state = peer.watch_state();

        if let Err(e) = peer.start().await {
            self.inner.remove(&peer_id);
            peer.close().await;
            return Err(e);
        }

        let outcome = tokio::time::timeout(self.inner.config.connection_timeout, async {
            loop {
                match *state.borrow() {
                    PeerState::Connected => return Ok(()),
                    PeerState::Failed => {
                        return Err(TransportError::HandshakeFailed(peer_id.clone()))
                    }
                    _ => {}
                }
                if state.changed().await.is_err() {
                    return Err(TransportError::HandshakeFailed(peer_id.clone()));
                }
            }
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.inner.remove(&peer_id);
                peer.close().await;
                Err(e)
            }
            Err(_) => {
                self.inner.remove(&peer_id);
                peer.close().await;
                Err(TransportError::Timeout(peer_id))
            }
        }
    }

    /// Close and remove a peer, telling the remote side to hang up.
    /// A no-op for unknown peers.
    pub async fn disconnect(&self, peer_id: &str) {
        let Some(peer) = self.inner.remove(peer_id) else {
            return;
        };
        let hangup = SignalMessage::new(
            SignalKind::Hangup,
            &*self.inner.local_id,
            peer_id,
            serde_json::Value::Null,
        );
        if let Err(e) = self.inner.signaling.send(hangup).await {
            tracing::debug!(peer = peer_id, "hangup signal failed: {e}");
        }
        peer.close().await;
    }

    /// Send one frame to one peer.
    pub async fn send(&self, peer_id: &str, frame: &Frame) -> Result<(), TransportError> {
        let peer = self
            .inner
            .peer(peer_id)
            .ok_or_else(|| TransportError::UnknownPeer(peer_id.to_string()))?;
        if peer.state() != PeerState::Connected {
            return Err(TransportError::NotConnected(peer_id.to_string()));
        }

        let bytes = encode(frame);
        peer.send_bytes(&bytes).await?;
        self.inner.count_sent(bytes.len());
        Ok(())
    }

    /// Send one frame to every Connected peer, encoding it once.
    ///
    /// Per-peer failures are logged and skipped; returns how many peers
    /// the frame reached.
    pub async fn broadcast(&self, frame: &Frame) -> usize {
        let bytes = encode(frame);
        let peers: Vec<Peer> = {
            let peers = self.inner.peers.lock().expect("mesh peers poisoned");
            peers
                .values()
                .filter(|p| p.state() == PeerState::Connected)
                .cloned()
                .collect()
        };

        let mut delivered = 0;
        for peer in peers {
            match peer.send_bytes(&bytes).await {
                Ok(()) => {
                    self.inner.count_sent(bytes.len());
                    delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(peer = peer.id(), "broadcast send failed: {e}");
                }
            }
        }
        delivered
    }

    /// Traffic snapshot.
    pub fn stats(&self) -> MeshStats {
        let peers_connected = {
            let peers = self.inner.peers.lock().expect("mesh peers poisoned");
            peers
                .values()
                .filter(|p| p.state() == PeerState::Connected)
                .count()
        };
        MeshStats {
            messages_sent: self.inner.counters.messages_sent.load(Ordering::Relaxed),
            messages_received: self
                .inner
                .counters
                .messages_received
                .load(Ordering::Relaxed),
            bytes_sent: self.inner.counters.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.inner.counters.bytes_received.load(Ordering::Relaxed),
            peers_connected,
        }
    }

    /// Current state of a peer, if it exists.
    pub fn peer_state(&self, peer_id: &str) -> Option<PeerState> {
        self.inner.peer(peer_id).map(|p| p.state())
    }

    /// Close every peer and stop routing.
    pub async fn close(&self) {
        let peers: Vec<Peer> = {
            let mut peers = self.inner.peers.lock().expect("mesh peers poisoned");
            peers.drain().map(|(_, p)| p).collect()
        };
        for peer in peers {
            peer.close().await;
        }
        let tasks = std::mem::take(&mut *self.inner.tasks.lock().expect("mesh tasks poisoned"));
        for task in tasks {
            task.abort();
        }
    }
}

impl MeshInner {
    fn peer(&self, peer_id: &str) -> Option<Peer> {
        self.peers
            .lock()
            .expect("mesh peers poisoned")
            .get(peer_id)
            .cloned()
    }

    fn remove(&self, peer_id: &str) -> Option<Peer> {
        self.peers
            .lock()
            .expect("mesh peers poisoned")
            .remove(peer_id)
    }

    fn count_sent(&self, bytes: usize) {
        self.counters.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_sent
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Create a peer, register it, and start forwarding its events.
    async fn spawn_peer(
        self: &Arc<Self>,
        peer_id: &str,
        role: PeerRole,
    ) -> Result<Peer, TransportError> {
        let (conn, conn_events) = self.connector.create().await?;
        let (peer_events_tx, peer_events) = mpsc::unbounded_channel();

        let peer = Peer::new(
            peer_id,
            role,
            conn,
            conn_events,
            self.signaling.clone(),
            self.config.clone(),
            peer_events_tx,
        );

        self.peers
            .lock()
            .expect("mesh peers poisoned")
            .insert(peer_id.to_string(), peer.clone());

        let forwarder = tokio::spawn(forward_peer_events(self.clone(), peer_events));
        self.tasks
            .lock()
            .expect("mesh tasks poisoned")
            .push(forwarder);

        Ok(peer)
    }
}

/// Route inbound signaling to the owning peer.
async fn route_signals(
    inner: Arc<MeshInner>,
    mut signals: mpsc::UnboundedReceiver<SignalMessage>,
) {
    while let Some(msg) = signals.recv().await {
        // Not ours: drop silently.
        if msg.to != inner.local_id {
            continue;
        }

        let from = msg.from.clone();
        match msg.kind {
            SignalKind::Offer => {
                let peer = match inner.peer(&from) {
                    Some(peer) => peer,
                    None => match inner.spawn_peer(&from, PeerRole::Responder).await {
                        Ok(peer) => peer,
                        Err(e) => {
                            tracing::warn!(peer = %from, "cannot answer offer: {e}");
                            continue;
                        }
                    },
                };
                if let Err(e) = peer.handle_signal(msg).await {
                    tracing::warn!(peer = %from, "offer handling failed: {e}");
                }
            }
            SignalKind::Answer | SignalKind::IceCandidate => match inner.peer(&from) {
                Some(peer) => {
                    if let Err(e) = peer.handle_signal(msg).await {
                        tracing::warn!(peer = %from, "signal handling failed: {e}");
                    }
                }
                None => {
                    tracing::warn!(peer = %from, kind = ?msg.kind, "signal for unknown peer dropped");
                }
            },
            SignalKind::Hangup => {
                if let Some(peer) = inner.remove(&from) {
                    peer.close().await;
                }
            }
        }
    }
}

/// Translate peer events into mesh events and keep receive counters.
async fn forward_peer_events(
    inner: Arc<MeshInner>,
    mut events: mpsc::UnboundedReceiver<PeerEvent>,
) {
    while let Some(event) = events.recv().await {
        let forwarded = match event {
            PeerEvent::StateChanged { peer_id, state } => match state {
                PeerState::Connected => MeshEvent::PeerConnected(peer_id),
                PeerState::Disconnected | PeerState::Failed | PeerState::Closed => {
                    MeshEvent::PeerDisconnected(peer_id)
                }
                _ => continue,
            },
            PeerEvent::Message { peer_id, frame } => {
                inner
                    .counters
                    .messages_received
                    .fetch_add(1, Ordering::Relaxed);
                inner.counters.bytes_received.fetch_add(
                    (crate::wire::HEADER_LEN + frame.payload.len()) as u64,
                    Ordering::Relaxed,
                );
                MeshEvent::Message { peer_id, frame }
            }
            PeerEvent::Error { peer_id, detail } => MeshEvent::Error { peer_id, detail },
        };
        if inner.events.send(forwarded).is_err() {
            return;
        }
    }
}
