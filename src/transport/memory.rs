//! In-process peer connections for tests and embedded meshes.
//!
//! Implements the [`PeerConnection`]/[`DataChannel`] interface without any
//! networking: descriptions carry a registration token, and "ICE" completes
//! the moment both sides have registered with the shared
//! [`MemoryNetwork`]. Candidates are accepted and recorded so handshake
//! ordering can be observed from tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::channel::{
    ChannelEvent, ChannelHandle, ChannelMode, ConnectionEvent, ConnectionState, DataChannel,
    PeerConnection, PeerConnector, SessionDescription,
};
use super::TransportError;

/// Shared registry linking in-memory connections to each other.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    registry: Arc<Mutex<HashMap<String, Arc<MemoryConnection>>>>,
}

impl MemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, token: &str, conn: &Arc<MemoryConnection>) {
        self.registry
            .lock()
            .expect("network registry poisoned")
            .insert(token.to_string(), conn.clone());
    }

    fn unregister(&self, token: &str) {
        self.registry
            .lock()
            .expect("network registry poisoned")
            .remove(token);
    }

    fn lookup(&self, token: &str) -> Option<Arc<MemoryConnection>> {
        self.registry
            .lock()
            .expect("network registry poisoned")
            .get(token)
            .cloned()
    }
}

/// Connector producing [`MemoryConnection`]s on a shared network.
pub struct MemoryConnector {
    network: MemoryNetwork,
}

impl MemoryConnector {
    /// Create a connector over `network`.
    pub fn new(network: MemoryNetwork) -> Self {
        Self { network }
    }
}

#[async_trait]
impl PeerConnector for MemoryConnector {
    async fn create(
        &self,
    ) -> Result<
        (
            Arc<dyn PeerConnection>,
            mpsc::UnboundedReceiver<ConnectionEvent>,
        ),
        TransportError,
    > {
        let (conn, events) = MemoryConnection::create(self.network.clone());
        Ok((conn, events))
    }
}

struct ConnState {
    pending: Vec<Arc<MemoryChannel>>,
    channels: Vec<Arc<MemoryChannel>>,
    remote_token: Option<String>,
    applied_candidates: Vec<Value>,
    closed: bool,
}

/// An in-memory peer connection endpoint.
pub struct MemoryConnection {
    token: String,
    network: MemoryNetwork,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    state: Mutex<ConnState>,
}

impl MemoryConnection {
    /// Create an endpoint and its event receiver.
    pub fn create(
        network: MemoryNetwork,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            token: Uuid::new_v4().to_string(),
            network: network.clone(),
            events,
            state: Mutex::new(ConnState {
                pending: Vec::new(),
                channels: Vec::new(),
                remote_token: None,
                applied_candidates: Vec::new(),
                closed: false,
            }),
        });
        network.register(&conn.token, &conn);
        (conn, rx)
    }

    /// Candidates applied so far, in application order.
    pub fn applied_candidates(&self) -> Vec<Value> {
        self.state
            .lock()
            .expect("connection state poisoned")
            .applied_candidates
            .clone()
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }

    /// Wire this endpoint (the answering side) to the offerer: every
    /// channel the offerer opened gets a twin here, both go open, and both
    /// endpoints report Connected.
    fn link_to(self: &Arc<Self>, offerer: &Arc<MemoryConnection>) {
        let pending = {
            let mut state = offerer.state.lock().expect("connection state poisoned");
            std::mem::take(&mut state.pending)
        };

        for channel in pending {
            let (twin, twin_events) = MemoryChannel::create(channel.label.clone(), channel.mode);

            *channel.remote.lock().expect("channel link poisoned") = Some(Arc::downgrade(&twin));
            *twin.remote.lock().expect("channel link poisoned") = Some(Arc::downgrade(&channel));
            channel.open.store(true, Ordering::SeqCst);
            twin.open.store(true, Ordering::SeqCst);

            self.state
                .lock()
                .expect("connection state poisoned")
                .channels
                .push(twin.clone());
            offerer
                .state
                .lock()
                .expect("connection state poisoned")
                .channels
                .push(channel.clone());

            self.emit(ConnectionEvent::DataChannel(ChannelHandle {
                channel: twin.clone(),
                events: twin_events,
            }));
            twin.emit_local(ChannelEvent::Open);
            channel.emit_local(ChannelEvent::Open);
        }

        self.emit(ConnectionEvent::StateChange(ConnectionState::Connected));
        offerer.emit(ConnectionEvent::StateChange(ConnectionState::Connected));
    }
}

#[async_trait]
impl PeerConnection for MemoryConnection {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        Ok(SessionDescription::offer(self.token.clone()))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        let state = self.state.lock().expect("connection state poisoned");
        if state.remote_token.is_none() {
            return Err(TransportError::Connection(
                "cannot answer before a remote offer is applied".to_string(),
            ));
        }
        Ok(SessionDescription::answer(self.token.clone()))
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        self.emit(ConnectionEvent::StateChange(ConnectionState::Connecting));
        // One synthetic host candidate, forwarded over signaling like a
        // real stack would.
        self.emit(ConnectionEvent::IceCandidate(serde_json::json!({
            "candidate": format!("host {}", self.token),
            "sdpMLineIndex": 0,
        })));

        if desc.sdp_type == "answer" {
            let remote_token = {
                let state = self.state.lock().expect("connection state poisoned");
                state.remote_token.clone()
            };
            let remote_token = remote_token.ok_or_else(|| {
                TransportError::Connection("answer applied before remote offer".to_string())
            })?;
            let offerer = self.network.lookup(&remote_token).ok_or_else(|| {
                TransportError::Connection(format!("no endpoint for token {remote_token}"))
            })?;
            let this = self.network.lookup(&self.token).ok_or_else(|| {
                TransportError::Connection("endpoint is no longer registered".to_string())
            })?;
            this.link_to(&offerer);
        }
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("connection state poisoned");
        state.remote_token = Some(desc.sdp);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: Value) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("connection state poisoned");
        if state.closed {
            return Err(TransportError::Connection(
                "connection is closed".to_string(),
            ));
        }
        state.applied_candidates.push(candidate);
        Ok(())
    }

    async fn create_data_channel(
        &self,
        label: &str,
        mode: ChannelMode,
    ) -> Result<ChannelHandle, TransportError> {
        let (channel, events) = MemoryChannel::create(label.to_string(), mode);
        self.state
            .lock()
            .expect("connection state poisoned")
            .pending
            .push(channel.clone());
        Ok(ChannelHandle { channel, events })
    }

    async fn close(&self) {
        let channels = {
            let mut state = self.state.lock().expect("connection state poisoned");
            if state.closed {
                return;
            }
            state.closed = true;
            state.pending.clear();
            std::mem::take(&mut state.channels)
        };
        for channel in channels {
            channel.close().await;
        }
        self.network.unregister(&self.token);
        self.emit(ConnectionEvent::StateChange(ConnectionState::Closed));
    }
}

/// One side of an in-memory data channel pair.
#[derive(Debug)]
pub struct MemoryChannel {
    label: String,
    mode: ChannelMode,
    open: AtomicBool,
    local_events: mpsc::UnboundedSender<ChannelEvent>,
    remote: Mutex<Option<Weak<MemoryChannel>>>,
}

impl MemoryChannel {
    fn create(
        label: String,
        mode: ChannelMode,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (local_events, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                label,
                mode,
                open: AtomicBool::new(false),
                local_events,
                remote: Mutex::new(None),
            }),
            rx,
        )
    }

    /// Delivery mode the channel was opened with.
    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    fn emit_local(&self, event: ChannelEvent) {
        let _ = self.local_events.send(event);
    }

    fn twin(&self) -> Option<Arc<MemoryChannel>> {
        self.remote
            .lock()
            .expect("channel link poisoned")
            .as_ref()
            .and_then(Weak::upgrade)
    }
}

#[async_trait]
impl DataChannel for MemoryChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ChannelClosed);
        }
        let twin = self.twin().ok_or(TransportError::ChannelClosed)?;
        twin.emit_local(ChannelEvent::Message(Bytes::copy_from_slice(data)));
        Ok(())
    }

    async fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        self.emit_local(ChannelEvent::Closed);
        if let Some(twin) = self.twin() {
            if twin.open.swap(false, Ordering::SeqCst) {
                twin.emit_local(ChannelEvent::Closed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn handshake(
        network: &MemoryNetwork,
    ) -> (
        Arc<MemoryConnection>,
        mpsc::UnboundedReceiver<ConnectionEvent>,
        ChannelHandle,
        Arc<MemoryConnection>,
        mpsc::UnboundedReceiver<ConnectionEvent>,
    ) {
        let (initiator, init_events) = MemoryConnection::create(network.clone());
        let (responder, resp_events) = MemoryConnection::create(network.clone());

        let handle = initiator
            .create_data_channel("mxp", ChannelMode::Reliable)
            .await
            .unwrap();

        let offer = initiator.create_offer().await.unwrap();
        initiator.set_local_description(offer.clone()).await.unwrap();

        responder.set_remote_description(offer).await.unwrap();
        let answer = responder.create_answer().await.unwrap();
        responder
            .set_local_description(answer.clone())
            .await
            .unwrap();
        initiator.set_remote_description(answer).await.unwrap();

        (initiator, init_events, handle, responder, resp_events)
    }

    #[tokio::test]
    async fn test_channel_pair_exchanges_bytes() {
        let network = MemoryNetwork::new();
        let (_init, _ie, mut handle, _resp, mut resp_events) = handshake(&network).await;

        // Responder gets its twin channel.
        let twin = loop {
            match resp_events.recv().await.unwrap() {
                ConnectionEvent::DataChannel(h) => break h,
                _ => continue,
            }
        };
        assert_eq!(twin.channel.label(), "mxp");

        assert!(matches!(
            handle.events.recv().await.unwrap(),
            ChannelEvent::Open
        ));

        handle.channel.send(b"over").await.unwrap();
        let mut twin_events = twin.events;
        assert!(matches!(
            twin_events.recv().await.unwrap(),
            ChannelEvent::Open
        ));
        match twin_events.recv().await.unwrap() {
            ChannelEvent::Message(data) => assert_eq!(&data[..], b"over"),
            other => panic!("expected message, got {other:?}"),
        }

        twin.channel.send(b"back").await.unwrap();
        match handle.events.recv().await.unwrap() {
            ChannelEvent::Message(data) => assert_eq!(&data[..], b"back"),
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_before_link_fails() {
        let network = MemoryNetwork::new();
        let (conn, _events) = MemoryConnection::create(network);
        let handle = conn
            .create_data_channel("mxp", ChannelMode::Reliable)
            .await
            .unwrap();
        assert!(!handle.channel.is_open());
        assert!(matches!(
            handle.channel.send(b"x").await,
            Err(TransportError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_propagates_to_twin() {
        let network = MemoryNetwork::new();
        let (_init, _ie, handle, _resp, mut resp_events) = handshake(&network).await;

        let twin = loop {
            match resp_events.recv().await.unwrap() {
                ConnectionEvent::DataChannel(h) => break h,
                _ => continue,
            }
        };

        handle.channel.close().await;
        assert!(!handle.channel.is_open());
        assert!(!twin.channel.is_open());
        assert!(matches!(
            twin.channel.send(b"x").await,
            Err(TransportError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_candidates_recorded_in_order() {
        let network = MemoryNetwork::new();
        let (conn, _events) = MemoryConnection::create(network);
        for i in 0..3 {
            conn.add_ice_candidate(serde_json::json!({"seq": i}))
                .await
                .unwrap();
        }
        let applied = conn.applied_candidates();
        assert_eq!(applied.len(), 3);
        for (i, candidate) in applied.iter().enumerate() {
            assert_eq!(candidate["seq"], i);
        }
    }

    #[tokio::test]
    async fn test_answer_before_offer_rejected() {
        let network = MemoryNetwork::new();
        let (conn, _events) = MemoryConnection::create(network);
        assert!(matches!(
            conn.create_answer().await,
            Err(TransportError::Connection(_))
        ));
    }
}
