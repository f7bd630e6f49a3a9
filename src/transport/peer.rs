//! Per-peer connection lifecycle.
//!
//! A [`Peer`] owns exactly one remote party: it sequences the
//! offer/answer/candidate handshake over signaling, adopts the `"mxp"`
//! data channel, keeps the link alive with ping/pong heartbeats, and
//! surfaces decoded frames as [`PeerEvent`]s. Every signaling input is
//! accepted in every state; inputs that do not apply are no-ops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::signaling::{SignalKind, SignalMessage, SignalingError, SignalingProvider};
use crate::wire::{decode, encode, Frame, FrameKind};

use super::channel::{
    ChannelEvent, ChannelHandle, ChannelMode, ConnectionEvent, ConnectionState, DataChannel,
    PeerConnection, SessionDescription,
};
use super::TransportError;

/// Label of the data channel every MXP peer opens.
pub const CHANNEL_LABEL: &str = "mxp";

/// Lifecycle state of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Created, handshake not started
    New,
    /// Handshake in progress
    Connecting,
    /// Data channel open
    Connected,
    /// Data channel lost
    Disconnected,
    /// Handshake or transport failed permanently
    Failed,
    /// Closed locally
    Closed,
}

/// Which side of the handshake this peer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// Creates the channel and the offer
    Initiator,
    /// Answers a received offer
    Responder,
}

/// Events a peer surfaces to its owner.
#[derive(Debug)]
pub enum PeerEvent {
    /// The peer changed lifecycle state
    StateChanged {
        /// Remote peer id
        peer_id: String,
        /// New state
        state: PeerState,
    },

    /// A frame arrived for the application
    Message {
        /// Remote peer id
        peer_id: String,
        /// The decoded frame
        frame: Frame,
    },

    /// A received chunk failed to decode, or another non-fatal fault
    Error {
        /// Remote peer id
        peer_id: String,
        /// What went wrong
        detail: String,
    },
}

/// Tunables for peer connections.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Ping cadence while connected
    pub heartbeat_interval: Duration,

    /// How long `connect` waits for the Connected state
    pub connection_timeout: Duration,

    /// Delivery mode for the data channel
    pub channel_mode: ChannelMode,
}

impl PeerConfig {
    /// Set the heartbeat cadence.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the channel delivery mode.
    pub fn with_channel_mode(mut self, mode: ChannelMode) -> Self {
        self.channel_mode = mode;
        self
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            connection_timeout: Duration::from_secs(30),
            channel_mode: ChannelMode::Reliable,
        }
    }
}

/// Liveness numbers for one peer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerStats {
    /// When the data channel opened
    pub connected_at: Option<Instant>,

    /// Last time any heartbeat traffic arrived
    pub last_seen: Option<Instant>,

    /// Round-trip time of the most recent ping/pong pair
    pub last_rtt: Option<Duration>,
}

struct Shared {
    id: String,
    local_id: String,
    role: PeerRole,
    config: PeerConfig,
    conn: Arc<dyn PeerConnection>,
    signaling: Arc<dyn SignalingProvider>,
    events: mpsc::UnboundedSender<PeerEvent>,
    state_tx: watch::Sender<PeerState>,
    channel: Mutex<Option<Arc<dyn DataChannel>>>,
    pending_candidates: Mutex<Vec<Value>>,
    remote_ready: AtomicBool,
    stats: Mutex<PeerStats>,
    outstanding_ping: Mutex<Option<(u64, Instant)>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    pumps: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

/// One remote party and the machinery to reach it.
#[derive(Clone)]
pub struct Peer {
    shared: Arc<Shared>,
}

impl Peer {
    /// Build a peer over an unconnected [`PeerConnection`].
    ///
    /// `events` receives everything the peer surfaces; the connection's
    /// event stream is consumed immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        role: PeerRole,
        conn: Arc<dyn PeerConnection>,
        conn_events: mpsc::UnboundedReceiver<ConnectionEvent>,
        signaling: Arc<dyn SignalingProvider>,
        config: PeerConfig,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Self {
        let (state_tx, _) = watch::channel(PeerState::New);
        let shared = Arc::new(Shared {
            id: id.into(),
            local_id: signaling.local_id().to_string(),
            role,
            config,
            conn,
            signaling,
            events,
            state_tx,
            channel: Mutex::new(None),
            pending_candidates: Mutex::new(Vec::new()),
            remote_ready: AtomicBool::new(false),
            stats: Mutex::new(PeerStats::default()),
            outstanding_ping: Mutex::new(None),
            heartbeat: Mutex::new(None),
            pumps: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });

        let pump = tokio::spawn(pump_connection(shared.clone(), conn_events));
        shared.pumps.lock().expect("peer pumps poisoned").push(pump);

        Self { shared }
    }

    /// Remote peer id.
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Which handshake side this peer plays.
    pub fn role(&self) -> PeerRole {
        self.shared.role
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PeerState {
        *self.shared.state_tx.borrow()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<PeerState> {
        self.shared.state_tx.subscribe()
    }

    /// Liveness snapshot.
    pub fn stats(&self) -> PeerStats {
        *self.shared.stats.lock().expect("peer stats poisoned")
    }

    /// Run the initiator side of the handshake: open the data channel,
    /// produce the offer, and emit it over signaling.
    pub async fn start(&self) -> Result<(), TransportError> {
        let shared = &self.shared;
        let result = async {
            shared.set_state(PeerState::Connecting);
            let handle = shared
                .conn
                .create_data_channel(CHANNEL_LABEL, shared.config.channel_mode)
                .await?;
            shared.adopt_channel(handle);

            let offer = shared.conn.create_offer().await?;
            shared.conn.set_local_description(offer.clone()).await?;
            shared.signal(SignalKind::Offer, description_payload(&offer)?).await
        }
        .await;

        if result.is_err() {
            shared.set_state(PeerState::Failed);
        }
        result
    }

    /// Feed one inbound signaling message to the state machine.
    pub async fn handle_signal(&self, msg: SignalMessage) -> Result<(), TransportError> {
        match msg.kind {
            SignalKind::Offer => self.accept_offer(msg.payload).await,
            SignalKind::Answer => self.accept_answer(msg.payload).await,
            SignalKind::IceCandidate => self.shared.apply_candidate(msg.payload).await,
            SignalKind::Hangup => {
                self.close().await;
                Ok(())
            }
        }
    }

    async fn accept_offer(&self, payload: Value) -> Result<(), TransportError> {
        let shared = &self.shared;
        let result = async {
            shared.set_state(PeerState::Connecting);
            let desc = parse_description(payload)?;
            shared.conn.set_remote_description(desc).await?;
            shared.remote_ready.store(true, Ordering::SeqCst);
            shared.drain_candidates().await?;

            let answer = shared.conn.create_answer().await?;
            shared.conn.set_local_description(answer.clone()).await?;
            shared
                .signal(SignalKind::Answer, description_payload(&answer)?)
                .await
        }
        .await;

        if result.is_err() {
            shared.set_state(PeerState::Failed);
        }
        result
    }

    async fn accept_answer(&self, payload: Value) -> Result<(), TransportError> {
        let shared = &self.shared;
        let result = async {
            let desc = parse_description(payload)?;
            shared.conn.set_remote_description(desc).await?;
            shared.remote_ready.store(true, Ordering::SeqCst);
            shared.drain_candidates().await
        }
        .await;

        if result.is_err() {
            shared.set_state(PeerState::Failed);
        }
        result
    }

    /// Encode and send one frame over the data channel.
    pub async fn send(&self, frame: &Frame) -> Result<(), TransportError> {
        self.shared.send_bytes(&encode(frame)).await
    }

    /// Send pre-encoded frame bytes. Used by broadcast to encode once.
    pub async fn send_bytes(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.shared.send_bytes(bytes).await
    }

    /// Tear the peer down: stop the heartbeat, close the channel and the
    /// connection. Idempotent; callable in any state.
    pub async fn close(&self) {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        shared.stop_heartbeat();

        let channel = shared.channel.lock().expect("peer channel poisoned").take();
        if let Some(channel) = channel {
            channel.close().await;
        }
        shared.conn.close().await;
        shared.set_state(PeerState::Closed);

        let pumps = std::mem::take(&mut *shared.pumps.lock().expect("peer pumps poisoned"));
        for pump in pumps {
            pump.abort();
        }
    }
}

impl Shared {
    fn set_state(&self, state: PeerState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            let _ = self.events.send(PeerEvent::StateChanged {
                peer_id: self.id.clone(),
                state,
            });
        }
    }

    async fn signal(&self, kind: SignalKind, payload: Value) -> Result<(), TransportError> {
        self.signaling
            .send(SignalMessage::new(kind, &*self.local_id, &*self.id, payload))
            .await?;
        Ok(())
    }

    async fn apply_candidate(&self, candidate: Value) -> Result<(), TransportError> {
        if self.remote_ready.load(Ordering::SeqCst) {
            self.conn.add_ice_candidate(candidate).await
        } else {
            self.pending_candidates
                .lock()
                .expect("peer candidates poisoned")
                .push(candidate);
            Ok(())
        }
    }

    /// Apply candidates queued before the remote description, preserving
    /// arrival order.
    async fn drain_candidates(&self) -> Result<(), TransportError> {
        let queued = std::mem::take(
            &mut *self
                .pending_candidates
                .lock()
                .expect("peer candidates poisoned"),
        );
        for candidate in queued {
            self.conn.add_ice_candidate(candidate).await?;
        }
        Ok(())
    }

    fn adopt_channel(self: &Arc<Self>, handle: ChannelHandle) {
        *self.channel.lock().expect("peer channel poisoned") = Some(handle.channel);
        let pump = tokio::spawn(pump_channel(self.clone(), handle.events));
        self.pumps.lock().expect("peer pumps poisoned").push(pump);
    }

    async fn send_bytes(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let channel = self
            .channel
            .lock()
            .expect("peer channel poisoned")
            .clone();
        match channel {
            Some(channel) if channel.is_open() => channel.send(bytes).await,
            _ => Err(TransportError::ChannelClosed),
        }
    }

    fn start_heartbeat(self: &Arc<Self>) {
        let shared = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(shared.config.heartbeat_interval);
            // The first tick fires immediately; skip it so pings start one
            // interval after connecting.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if *shared.state_tx.borrow() != PeerState::Connected {
                    break;
                }
                let ping = Frame::ping();
                *shared
                    .outstanding_ping
                    .lock()
                    .expect("peer ping poisoned") = Some((ping.message_id, Instant::now()));
                if let Err(e) = shared.send_bytes(&encode(&ping)).await {
                    tracing::debug!(peer = %shared.id, "heartbeat send failed: {e}");
                    break;
                }
            }
        });

        let mut slot = self.heartbeat.lock().expect("peer heartbeat poisoned");
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    fn stop_heartbeat(&self) {
        if let Some(handle) = self
            .heartbeat
            .lock()
            .expect("peer heartbeat poisoned")
            .take()
        {
            handle.abort();
        }
    }

    fn mark_seen(&self) {
        self.stats.lock().expect("peer stats poisoned").last_seen = Some(Instant::now());
    }

    async fn on_data(self: &Arc<Self>, bytes: &[u8]) {
        let frame = match decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = self.events.send(PeerEvent::Error {
                    peer_id: self.id.clone(),
                    detail: e.to_string(),
                });
                return;
            }
        };

        match frame.kind {
            // Heartbeat traffic is consumed here, never delivered.
            FrameKind::Ping => {
                self.mark_seen();
                let pong = Frame::pong(&frame);
                if let Err(e) = self.send_bytes(&encode(&pong)).await {
                    tracing::debug!(peer = %self.id, "pong send failed: {e}");
                }
            }
            FrameKind::Pong => {
                self.mark_seen();
                let outstanding = self
                    .outstanding_ping
                    .lock()
                    .expect("peer ping poisoned")
                    .take();
                if let Some((ping_id, sent_at)) = outstanding {
                    if frame.correlation_id == ping_id {
                        self.stats.lock().expect("peer stats poisoned").last_rtt =
                            Some(sent_at.elapsed());
                    }
                }
            }
            _ => {
                let _ = self.events.send(PeerEvent::Message {
                    peer_id: self.id.clone(),
                    frame,
                });
            }
        }
    }
}

fn parse_description(payload: Value) -> Result<SessionDescription, TransportError> {
    serde_json::from_value(payload)
        .map_err(|e| TransportError::Connection(format!("bad session description: {e}")))
}

fn description_payload(desc: &SessionDescription) -> Result<Value, TransportError> {
    serde_json::to_value(desc)
        .map_err(|e| TransportError::Signaling(SignalingError::Serialization(e)))
}

async fn pump_connection(
    shared: Arc<Shared>,
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::IceCandidate(candidate) => {
                if let Err(e) = shared.signal(SignalKind::IceCandidate, candidate).await {
                    tracing::warn!(peer = %shared.id, "candidate signal failed: {e}");
                }
            }
            ConnectionEvent::StateChange(state) => match state {
                ConnectionState::Failed => shared.set_state(PeerState::Failed),
                ConnectionState::Disconnected => {
                    if !shared.closed.load(Ordering::SeqCst) {
                        shared.set_state(PeerState::Disconnected);
                    }
                }
                // Connected is driven by the channel opening, not the
                // transport state.
                _ => {}
            },
            ConnectionEvent::DataChannel(handle) => shared.adopt_channel(handle),
        }
    }
}

async fn pump_channel(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<ChannelEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::Open => {
                shared.stats.lock().expect("peer stats poisoned").connected_at =
                    Some(Instant::now());
                shared.set_state(PeerState::Connected);
                shared.start_heartbeat();
            }
            ChannelEvent::Message(bytes) => shared.on_data(&bytes).await,
            ChannelEvent::Closed => {
                shared.stop_heartbeat();
                if !shared.closed.load(Ordering::SeqCst) {
                    shared.set_state(PeerState::Disconnected);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::signaling::SignalingHub;
    use crate::transport::memory::{MemoryConnection, MemoryNetwork};

    use super::*;

    /// Wire a hub endpoint to a peer so inbound signals reach it.
    fn route_signals(peer: Peer, mut rx: UnboundedReceiver<SignalMessage>) {
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let _ = peer.handle_signal(msg).await;
            }
        });
    }

    struct Pair {
        alice: Peer,
        alice_events: UnboundedReceiver<PeerEvent>,
        bob: Peer,
        bob_events: UnboundedReceiver<PeerEvent>,
    }

    async fn connected_pair(config: PeerConfig) -> Pair {
        let network = MemoryNetwork::new();
        let hub = SignalingHub::new();

        let (alice_signaling, alice_rx) = hub.attach("alice");
        let (bob_signaling, bob_rx) = hub.attach("bob");

        let (alice_conn, alice_conn_events) = MemoryConnection::create(network.clone());
        let (bob_conn, bob_conn_events) = MemoryConnection::create(network.clone());

        let (alice_tx, alice_events) = mpsc::unbounded_channel();
        let (bob_tx, bob_events) = mpsc::unbounded_channel();

        let alice = Peer::new(
            "bob",
            PeerRole::Initiator,
            alice_conn,
            alice_conn_events,
            Arc::new(alice_signaling),
            config.clone(),
            alice_tx,
        );
        let bob = Peer::new(
            "alice",
            PeerRole::Responder,
            bob_conn,
            bob_conn_events,
            Arc::new(bob_signaling),
            config,
            bob_tx,
        );

        route_signals(alice.clone(), alice_rx);
        route_signals(bob.clone(), bob_rx);

        alice.start().await.unwrap();

        let mut alice_state = alice.watch_state();
        while *alice_state.borrow() != PeerState::Connected {
            alice_state.changed().await.unwrap();
        }
        let mut bob_state = bob.watch_state();
        while *bob_state.borrow() != PeerState::Connected {
            bob_state.changed().await.unwrap();
        }

        Pair {
            alice,
            alice_events,
            bob,
            bob_events,
        }
    }

    async fn next_message(events: &mut UnboundedReceiver<PeerEvent>) -> Frame {
        loop {
            match events.recv().await.expect("event stream ended") {
                PeerEvent::Message { frame, .. } => return frame,
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_handshake_and_frame_exchange() {
        let mut pair = connected_pair(PeerConfig::default()).await;
        assert_eq!(pair.alice.state(), PeerState::Connected);
        assert_eq!(pair.bob.state(), PeerState::Connected);
        assert!(pair.alice.stats().connected_at.is_some());

        let frame = Frame::call(&b"hello bob"[..]);
        pair.alice.send(&frame).await.unwrap();

        let received = next_message(&mut pair.bob_events).await;
        assert_eq!(received, frame);

        let reply = Frame::reply(&received, &b"hello alice"[..]);
        pair.bob.send(&reply).await.unwrap();
        let received = next_message(&mut pair.alice_events).await;
        assert_eq!(received.correlation_id, frame.message_id);
        assert_eq!(received.trace_id, frame.trace_id);
    }

    #[tokio::test]
    async fn test_candidates_buffered_until_remote_description() {
        let network = MemoryNetwork::new();
        let hub = SignalingHub::new();
        let (responder_signaling, _responder_rx) = hub.attach("responder");
        let (_initiator_signaling, _initiator_rx) = hub.attach("initiator");

        let (conn, conn_events) = MemoryConnection::create(network.clone());
        let (events_tx, _events) = mpsc::unbounded_channel();
        let peer = Peer::new(
            "initiator",
            PeerRole::Responder,
            conn.clone(),
            conn_events,
            Arc::new(responder_signaling),
            PeerConfig::default(),
            events_tx,
        );

        // Candidates arrive before any description.
        for i in 0..3 {
            peer.handle_signal(SignalMessage::new(
                SignalKind::IceCandidate,
                "initiator",
                "responder",
                serde_json::json!({"seq": i}),
            ))
            .await
            .unwrap();
        }
        assert!(conn.applied_candidates().is_empty());

        // The offer needs a registered remote endpoint to answer into.
        let (remote_conn, _remote_events) = MemoryConnection::create(network);
        let remote_handle = remote_conn
            .create_data_channel(CHANNEL_LABEL, ChannelMode::Reliable)
            .await
            .unwrap();
        drop(remote_handle);
        let offer = remote_conn.create_offer().await.unwrap();
        remote_conn
            .set_local_description(offer.clone())
            .await
            .unwrap();

        peer.handle_signal(SignalMessage::new(
            SignalKind::Offer,
            "initiator",
            "responder",
            serde_json::to_value(offer).unwrap(),
        ))
        .await
        .unwrap();

        let applied = conn.applied_candidates();
        let seqs: Vec<i64> = applied
            .iter()
            .filter(|c| c.get("seq").is_some())
            .map(|c| c["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_send_after_close_fails_and_close_is_idempotent() {
        let pair = connected_pair(PeerConfig::default()).await;

        pair.alice.close().await;
        assert_eq!(pair.alice.state(), PeerState::Closed);

        let err = pair.alice.send(&Frame::ping()).await.unwrap_err();
        assert!(matches!(err, TransportError::ChannelClosed));

        // Further closes are no-ops.
        pair.alice.close().await;
        assert_eq!(pair.alice.state(), PeerState::Closed);
    }

    #[tokio::test]
    async fn test_heartbeat_consumed_internally() {
        let config = PeerConfig::default().with_heartbeat_interval(Duration::from_millis(10));
        let mut pair = connected_pair(config).await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        // Pings flowed both ways and produced RTT samples...
        assert!(pair.alice.stats().last_rtt.is_some());
        assert!(pair.bob.stats().last_seen.is_some());

        // ...but neither side saw a Ping or Pong as an application event.
        pair.alice.close().await;
        pair.bob.close().await;
        while let Ok(event) = pair.alice_events.try_recv() {
            if let PeerEvent::Message { frame, .. } = event {
                panic!("heartbeat frame leaked to application: {:?}", frame.kind);
            }
        }
        while let Ok(event) = pair.bob_events.try_recv() {
            if let PeerEvent::Message { frame, .. } = event {
                panic!("heartbeat frame leaked to application: {:?}", frame.kind);
            }
        }
    }

    #[tokio::test]
    async fn test_decode_failure_emits_error_event() {
        let mut pair = connected_pair(PeerConfig::default()).await;

        // Push garbage straight through the data channel.
        pair.alice.send_bytes(b"junk that is not a frame").await.unwrap();

        loop {
            match pair.bob_events.recv().await.expect("event stream ended") {
                PeerEvent::Error { detail, .. } => {
                    assert!(detail.contains("too short"));
                    break;
                }
                PeerEvent::Message { .. } => panic!("garbage delivered as a frame"),
                _ => continue,
            }
        }
    }
}
