//! Socket relay signaling over WebSocket.
//!
//! Connects to a relay URL with the local peer id as a query parameter and
//! exchanges [`SignalMessage`]s as JSON text frames. Dropped connections
//! are retried with linear-growth backoff (base × attempt) up to a
//! configurable number of attempts.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage, MaybeTlsStream,
    WebSocketStream};
use url::Url;

use super::{SignalMessage, SignalingError, SignalingProvider};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for a [`SocketSignaling`] relay connection.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Relay URL (`ws://` or `wss://`)
    pub url: Url,

    /// Base reconnect delay; attempt `n` waits `base × n`
    pub reconnect_base: Duration,

    /// Reconnect attempts before giving up
    pub max_attempts: u32,
}

impl SocketConfig {
    /// Configuration with the default backoff (1 s base, 5 attempts).
    pub fn new(url: Url) -> Self {
        Self {
            url,
            reconnect_base: Duration::from_secs(1),
            max_attempts: 5,
        }
    }

    /// Set the base reconnect delay.
    pub fn with_reconnect_base(mut self, base: Duration) -> Self {
        self.reconnect_base = base;
        self
    }

    /// Set the reconnect attempt cap.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }
}

/// Signaling over a WebSocket relay.
pub struct SocketSignaling {
    local_id: String,
    outbound: mpsc::UnboundedSender<SignalMessage>,
}

impl SocketSignaling {
    /// Connect to the relay and start the pump task.
    ///
    /// The initial connection is made eagerly so connection failures
    /// surface here rather than on the first send. Returns the provider
    /// and the inbound receiver; the receiver closes when the relay is
    /// unreachable past the reconnect budget.
    pub async fn connect(
        config: SocketConfig,
        local_id: impl Into<String>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SignalMessage>), SignalingError> {
        let local_id = local_id.into();
        let url = relay_url(&config.url, &local_id);

        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| SignalingError::Transport(format!("relay connect failed: {e}")))?;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(pump(ws, url, config, outbound_rx, inbound_tx));

        Ok((
            Self {
                local_id,
                outbound,
            },
            inbound_rx,
        ))
    }
}

fn relay_url(base: &Url, local_id: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("peer_id", local_id);
    url
}

/// Forward outbound messages to the socket and socket frames inbound,
/// reconnecting on failure until the attempt budget is spent.
async fn pump(
    mut ws: WsStream,
    url: Url,
    config: SocketConfig,
    mut outbound: mpsc::UnboundedReceiver<SignalMessage>,
    inbound: mpsc::UnboundedSender<SignalMessage>,
) {
    loop {
        let disconnect = drive(&mut ws, &mut outbound, &inbound).await;
        match disconnect {
            Disconnect::LocalClosed => return,
            Disconnect::RemoteClosed => {
                tracing::warn!("signaling relay connection lost, reconnecting");
            }
        }

        match reconnect(&url, &config).await {
            Some(stream) => ws = stream,
            None => {
                tracing::error!(
                    attempts = config.max_attempts,
                    "signaling relay unreachable, giving up"
                );
                return;
            }
        }
    }
}

enum Disconnect {
    /// The provider side was dropped; stop for good.
    LocalClosed,
    /// The socket failed or closed; try to reconnect.
    RemoteClosed,
}

async fn drive(
    ws: &mut WsStream,
    outbound: &mut mpsc::UnboundedReceiver<SignalMessage>,
    inbound: &mpsc::UnboundedSender<SignalMessage>,
) -> Disconnect {
    loop {
        tokio::select! {
            msg = outbound.recv() => {
                let Some(msg) = msg else {
                    return Disconnect::LocalClosed;
                };
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("dropping unserializable signal: {e}");
                        continue;
                    }
                };
                if ws.send(WsMessage::Text(text)).await.is_err() {
                    return Disconnect::RemoteClosed;
                }
            }
            frame = ws.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<SignalMessage>(&text) {
                            Ok(msg) => {
                                if inbound.send(msg).is_err() {
                                    return Disconnect::LocalClosed;
                                }
                            }
                            Err(e) => tracing::warn!("ignoring malformed signal: {e}"),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return Disconnect::RemoteClosed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("signaling socket error: {e}");
                        return Disconnect::RemoteClosed;
                    }
                }
            }
        }
    }
}

async fn reconnect(url: &Url, config: &SocketConfig) -> Option<WsStream> {
    for attempt in 1..=config.max_attempts {
        tokio::time::sleep(config.reconnect_base * attempt).await;
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                tracing::debug!(attempt, "signaling relay reconnected");
                return Some(ws);
            }
            Err(e) => tracing::warn!(attempt, "signaling reconnect failed: {e}"),
        }
    }
    None
}

#[async_trait]
impl SignalingProvider for SocketSignaling {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    async fn send(&self, msg: SignalMessage) -> Result<(), SignalingError> {
        self.outbound.send(msg).map_err(|_| SignalingError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_url_carries_peer_id() {
        let base = Url::parse("ws://relay.example.com/signal").unwrap();
        let url = relay_url(&base, "peer-42");
        assert_eq!(url.as_str(), "ws://relay.example.com/signal?peer_id=peer-42");
    }

    #[test]
    fn test_config_defaults() {
        let config = SocketConfig::new(Url::parse("ws://relay.example.com").unwrap());
        assert_eq!(config.reconnect_base, Duration::from_secs(1));
        assert_eq!(config.max_attempts, 5);

        let config = config
            .with_reconnect_base(Duration::from_millis(100))
            .with_max_attempts(2);
        assert_eq!(config.reconnect_base, Duration::from_millis(100));
        assert_eq!(config.max_attempts, 2);
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces() {
        // Nothing listens on this port.
        let config = SocketConfig::new(Url::parse("ws://127.0.0.1:1").unwrap());
        let result = SocketSignaling::connect(config, "peer").await;
        assert!(matches!(result, Err(SignalingError::Transport(_))));
    }
}
